//! In-memory device directory.
//!
//! Backs the test suite and makes the core runnable without a platform
//! audio stack. Devices can be added, removed mid-run, and told to fail
//! queries, which is enough to exercise every error path the Windows
//! implementation can produce.

use super::device::{AudioError, DeviceDirectory, VolumeControl};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct DeviceState {
    muted: bool,
    volume: f32,
    fail_queries: bool,
    mutations: usize,
    status_mutations: usize,
}

#[derive(Debug, Default)]
struct DirectoryState {
    devices: BTreeMap<String, DeviceState>,
    default_device: Option<String>,
}

/// Shared-state in-memory implementation of [`DeviceDirectory`].
///
/// Clones share the same underlying device set, so a test can keep one
/// handle for assertions while the controller owns another.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<DirectoryState>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device; the first added device becomes the default.
    pub fn add_device(&self, name: &str, muted: bool) {
        let mut state = self.inner.lock().unwrap();
        state.devices.insert(
            name.to_string(),
            DeviceState {
                muted,
                volume: 1.0,
                fail_queries: false,
                mutations: 0,
                status_mutations: 0,
            },
        );
        if state.default_device.is_none() {
            state.default_device = Some(name.to_string());
        }
    }

    pub fn set_default(&self, name: &str) {
        self.inner.lock().unwrap().default_device = Some(name.to_string());
    }

    /// Simulate the device vanishing mid-run.
    pub fn remove_device(&self, name: &str) {
        let mut state = self.inner.lock().unwrap();
        state.devices.remove(name);
        if state.default_device.as_deref() == Some(name) {
            state.default_device = None;
        }
    }

    /// Make every query against `name` fail with a `DeviceQuery` error.
    pub fn set_fail_queries(&self, name: &str, fail: bool) {
        if let Some(device) = self.inner.lock().unwrap().devices.get_mut(name) {
            device.fail_queries = fail;
        }
    }

    pub fn set_volume_of(&self, name: &str, level: f32) {
        if let Some(device) = self.inner.lock().unwrap().devices.get_mut(name) {
            device.volume = level;
        }
    }

    pub fn mute_of(&self, name: &str) -> Option<bool> {
        self.inner.lock().unwrap().devices.get(name).map(|d| d.muted)
    }

    pub fn volume_of(&self, name: &str) -> Option<f32> {
        self.inner.lock().unwrap().devices.get(name).map(|d| d.volume)
    }

    /// Number of mute mutations actually issued against `name` (no-op
    /// idempotent calls do not count).
    pub fn mute_mutations(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(name)
            .map(|d| d.status_mutations)
            .unwrap_or(0)
    }

    /// Total mutations (mute and volume) issued against `name`.
    pub fn mutations(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(name)
            .map(|d| d.mutations)
            .unwrap_or(0)
    }
}

struct MemoryEndpoint {
    name: String,
    inner: Arc<Mutex<DirectoryState>>,
}

impl MemoryEndpoint {
    fn with_device<T>(
        &self,
        op: impl FnOnce(&mut DeviceState) -> Result<T, AudioError>,
    ) -> Result<T, AudioError> {
        let mut state = self.inner.lock().unwrap();
        match state.devices.get_mut(&self.name) {
            Some(device) => op(device),
            None => Err(AudioError::DeviceNotFound {
                name: self.name.clone(),
            }),
        }
    }
}

impl VolumeControl for MemoryEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_mute(&self) -> Result<bool, AudioError> {
        let name = self.name.clone();
        self.with_device(|device| {
            if device.fail_queries {
                return Err(AudioError::DeviceQuery {
                    device: name,
                    detail: "simulated query failure".into(),
                });
            }
            Ok(device.muted)
        })
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.with_device(|device| {
            device.muted = muted;
            device.mutations += 1;
            device.status_mutations += 1;
            Ok(())
        })
    }

    fn get_volume(&self) -> Result<f32, AudioError> {
        let name = self.name.clone();
        self.with_device(|device| {
            if device.fail_queries {
                return Err(AudioError::DeviceQuery {
                    device: name,
                    detail: "simulated query failure".into(),
                });
            }
            Ok(device.volume)
        })
    }

    fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        self.with_device(|device| {
            device.volume = level;
            device.mutations += 1;
            Ok(())
        })
    }
}

impl DeviceDirectory for MemoryDirectory {
    fn capture_devices(&self) -> Result<Vec<Box<dyn VolumeControl>>, AudioError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .devices
            .keys()
            .map(|name| {
                Box::new(MemoryEndpoint {
                    name: name.clone(),
                    inner: Arc::clone(&self.inner),
                }) as Box<dyn VolumeControl>
            })
            .collect())
    }

    fn default_capture(&self) -> Result<Box<dyn VolumeControl>, AudioError> {
        let state = self.inner.lock().unwrap();
        let name = state
            .default_device
            .clone()
            .ok_or(AudioError::NoDefaultDevice)?;
        if !state.devices.contains_key(&name) {
            return Err(AudioError::NoDefaultDevice);
        }
        Ok(Box::new(MemoryEndpoint {
            name,
            inner: Arc::clone(&self.inner),
        }))
    }
}
