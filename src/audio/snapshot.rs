//! Device-state snapshot and restore.
//!
//! The gate actively overrides mute state for the run's duration, but it
//! must not leave any device in a different state than it found it. The
//! baseline is captured once at startup, before the default device is
//! forced into the gated state, and only devices that were actually
//! engaged are restored at shutdown.

use super::device::{AudioError, DeviceDirectory, VolumeControl};
use crate::state::DeviceSnapshot;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Captures per-device baselines at startup and restores them at shutdown.
#[derive(Debug, Default)]
pub struct DeviceStateManager {
    snapshots: Vec<DeviceSnapshot>,
}

impl DeviceStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mute state of every active capture device.
    ///
    /// A device whose mute state cannot be read is recorded as unmuted so
    /// that a later restore cannot silently leave it muted.
    pub fn snapshot_all(&mut self, directory: &dyn DeviceDirectory) -> Result<(), AudioError> {
        let devices = directory.capture_devices()?;
        self.snapshots.clear();

        for device in &devices {
            let was_muted = query_mute_assume_unmuted(device.as_ref());
            info!(device = device.name(), muted = was_muted, "captured baseline");
            self.snapshots.push(DeviceSnapshot {
                device_name: device.name().to_string(),
                was_muted,
            });
        }

        Ok(())
    }

    pub fn snapshots(&self) -> &[DeviceSnapshot] {
        &self.snapshots
    }

    /// Restore every used device to its baseline mute state.
    ///
    /// The device set may have changed since startup, so each used name is
    /// looked up in the current directory listing; a vanished device is
    /// reported and skipped.
    pub fn restore(&self, directory: &dyn DeviceDirectory, used: &BTreeSet<String>) {
        let devices = match directory.capture_devices() {
            Ok(devices) => devices,
            Err(err) => {
                warn!(error = %err, "could not enumerate devices for restore");
                return;
            }
        };

        for snapshot in self.snapshots.iter().filter(|s| used.contains(&s.device_name)) {
            match devices.iter().find(|d| d.name() == snapshot.device_name) {
                Some(device) => {
                    info!(
                        device = %snapshot.device_name,
                        muted = snapshot.was_muted,
                        "restoring baseline mute state"
                    );
                    restore_mute(device.as_ref(), snapshot.was_muted);
                }
                None => {
                    // Device vanished during the run; nothing to restore.
                    warn!(device = %snapshot.device_name, "device gone, skipping restore");
                }
            }
        }
    }
}

/// Read a device's mute state, treating a failed query as "unmuted" so the
/// caller never blocks shutdown on a flaky device.
fn query_mute_assume_unmuted(device: &dyn VolumeControl) -> bool {
    match device.get_mute() {
        Ok(muted) => muted,
        Err(err) => {
            warn!(device = device.name(), error = %err, "mute query failed, assuming unmuted");
            false
        }
    }
}

fn restore_mute(device: &dyn VolumeControl, target: bool) {
    if query_mute_assume_unmuted(device) == target {
        return;
    }
    if let Err(err) = device.set_mute(target) {
        warn!(device = device.name(), error = %err, "failed to restore mute state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::memory::MemoryDirectory;

    fn used(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn round_trips_muted_and_unmuted_baselines() {
        let directory = MemoryDirectory::new();
        directory.add_device("Was Muted", true);
        directory.add_device("Was Open", false);

        let mut manager = DeviceStateManager::new();
        manager.snapshot_all(&directory).unwrap();

        // The run flips both devices around.
        for device in directory.capture_devices().unwrap() {
            device.set_mute(device.name() == "Was Open").unwrap();
        }

        manager.restore(&directory, &used(&["Was Muted", "Was Open"]));
        assert_eq!(directory.mute_of("Was Muted"), Some(true));
        assert_eq!(directory.mute_of("Was Open"), Some(false));
    }

    #[test]
    fn only_used_devices_are_touched() {
        let directory = MemoryDirectory::new();
        directory.add_device("Default Mic", true);
        directory.add_device("Spare Mic", false);

        let mut manager = DeviceStateManager::new();
        manager.snapshot_all(&directory).unwrap();

        // The run unmutes the default; the spare is flipped by some other
        // application and must stay however it was left.
        directory.capture_devices().unwrap()[0].set_mute(false).unwrap();
        directory.set_volume_of("Spare Mic", 0.5);
        let spare_mutations = directory.mutations("Spare Mic");

        manager.restore(&directory, &used(&["Default Mic"]));

        assert_eq!(directory.mute_of("Default Mic"), Some(true));
        assert_eq!(directory.mutations("Spare Mic"), spare_mutations);
    }

    #[test]
    fn vanished_device_is_skipped_without_error() {
        let directory = MemoryDirectory::new();
        directory.add_device("Unplugged Mic", true);
        directory.add_device("Stable Mic", false);

        let mut manager = DeviceStateManager::new();
        manager.snapshot_all(&directory).unwrap();

        directory.capture_devices().unwrap().iter().for_each(|d| {
            d.set_mute(d.name() == "Stable Mic").unwrap();
        });
        directory.remove_device("Unplugged Mic");

        manager.restore(&directory, &used(&["Unplugged Mic", "Stable Mic"]));
        assert_eq!(directory.mute_of("Stable Mic"), Some(false));
    }

    #[test]
    fn unreadable_baseline_is_recorded_as_unmuted() {
        let directory = MemoryDirectory::new();
        directory.add_device("Flaky Mic", true);
        directory.set_fail_queries("Flaky Mic", true);

        let mut manager = DeviceStateManager::new();
        manager.snapshot_all(&directory).unwrap();

        assert_eq!(manager.snapshots()[0].was_muted, false);
    }
}
