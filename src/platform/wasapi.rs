//! Windows Core Audio implementation of the device directory.
//!
//! Uses the MMDevice API to enumerate active capture endpoints and
//! `IAudioEndpointVolume` for mute/volume control. COM must be
//! initialized on the calling thread before constructing the directory,
//! and every handle produced here is bound to that apartment.

use crate::audio::{AudioError, DeviceDirectory, VolumeControl};
use tracing::warn;
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, Endpoints::IAudioEndpointVolume, IMMDevice, IMMDeviceEnumerator,
    MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, STGM};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// Device directory backed by the Windows MMDevice enumerator.
pub struct WasapiDirectory {
    enumerator: IMMDeviceEnumerator,
}

impl WasapiDirectory {
    /// Create a new directory.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| AudioError::Enumeration(e.to_string()))?;
            Ok(Self { enumerator })
        }
    }

    fn open_endpoint(&self, device: &IMMDevice) -> Result<WasapiEndpoint, AudioError> {
        let name = device_name(device).unwrap_or_else(|| "Unknown".to_string());
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| AudioError::DeviceQuery {
                    device: name.clone(),
                    detail: e.to_string(),
                })?;
            Ok(WasapiEndpoint {
                name,
                endpoint_volume,
            })
        }
    }
}

impl DeviceDirectory for WasapiDirectory {
    fn capture_devices(&self) -> Result<Vec<Box<dyn VolumeControl>>, AudioError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| AudioError::Enumeration(e.to_string()))?;
            let count = collection
                .GetCount()
                .map_err(|e| AudioError::Enumeration(e.to_string()))?;

            let mut devices: Vec<Box<dyn VolumeControl>> = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection
                    .Item(i)
                    .map_err(|e| AudioError::Enumeration(e.to_string()))?;
                // A single endpoint without a volume interface should not
                // take the whole listing down.
                match self.open_endpoint(&device) {
                    Ok(endpoint) => devices.push(Box::new(endpoint)),
                    Err(err) => warn!(error = %err, "skipping capture device"),
                }
            }
            Ok(devices)
        }
    }

    fn default_capture(&self) -> Result<Box<dyn VolumeControl>, AudioError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| AudioError::NoDefaultDevice)?;
            Ok(Box::new(self.open_endpoint(&device)?))
        }
    }
}

/// Get the friendly name of a device from its property store.
fn device_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        // Convert DEVPROPKEY to PROPERTYKEY
        let key = PROPERTYKEY {
            fmtid: DEVPKEY_Device_FriendlyName.fmtid,
            pid: DEVPKEY_Device_FriendlyName.pid,
        };

        let props: IPropertyStore = device.OpenPropertyStore(STGM(0)).ok()?;
        let prop = props.GetValue(&key).ok()?;

        let name = prop.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Mute/volume control over one endpoint via `IAudioEndpointVolume`.
pub struct WasapiEndpoint {
    name: String,
    endpoint_volume: IAudioEndpointVolume,
}

impl VolumeControl for WasapiEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_mute(&self) -> Result<bool, AudioError> {
        unsafe {
            self.endpoint_volume
                .GetMute()
                .map(|muted| muted.as_bool())
                .map_err(|e| AudioError::DeviceQuery {
                    device: self.name.clone(),
                    detail: e.to_string(),
                })
        }
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        unsafe {
            self.endpoint_volume
                .SetMute(muted, std::ptr::null())
                .map_err(|e| AudioError::DeviceMutation {
                    device: self.name.clone(),
                    detail: e.to_string(),
                })
        }
    }

    fn get_volume(&self) -> Result<f32, AudioError> {
        unsafe {
            self.endpoint_volume
                .GetMasterVolumeLevelScalar()
                .map_err(|e| AudioError::DeviceQuery {
                    device: self.name.clone(),
                    detail: e.to_string(),
                })
        }
    }

    fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        let level = level.clamp(0.0, 1.0);
        unsafe {
            self.endpoint_volume
                .SetMasterVolumeLevelScalar(level, std::ptr::null())
                .map_err(|e| AudioError::DeviceMutation {
                    device: self.name.clone(),
                    detail: e.to_string(),
                })
        }
    }
}
