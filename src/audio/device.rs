//! Audio device capabilities and error types.
//!
//! The core never talks to the platform audio stack directly; it consumes
//! these traits. The Windows implementation lives in `platform::wasapi`,
//! and an in-memory implementation backs the tests.

use thiserror::Error;

/// Audio service error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("COM initialization failed: {0}")]
    ComInit(String),

    #[error("failed to enumerate capture devices: {0}")]
    Enumeration(String),

    #[error("no default capture device available")]
    NoDefaultDevice,

    #[error("device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("device query failed on {device}: {detail}")]
    DeviceQuery { device: String, detail: String },

    #[error("device mutation failed on {device}: {detail}")]
    DeviceMutation { device: String, detail: String },
}

/// Mute/volume control over one capture device.
///
/// The handle is owned by whoever acquired it and released on drop. It is
/// not copyable, and every mutation against it is serialized by the
/// command queue; the handle itself carries no locking.
pub trait VolumeControl {
    /// Human-readable device name (from device properties).
    fn name(&self) -> &str;

    /// Current endpoint mute state.
    fn get_mute(&self) -> Result<bool, AudioError>;

    /// Set the endpoint mute state.
    fn set_mute(&self, muted: bool) -> Result<(), AudioError>;

    /// Current master volume level (0.0 to 1.0).
    fn get_volume(&self) -> Result<f32, AudioError>;

    /// Set the master volume level (0.0 to 1.0).
    fn set_volume(&self, level: f32) -> Result<(), AudioError>;
}

/// Directory of active capture devices.
pub trait DeviceDirectory {
    /// All active capture devices, each paired with its control handle.
    fn capture_devices(&self) -> Result<Vec<Box<dyn VolumeControl>>, AudioError>;

    /// The current default capture device.
    fn default_capture(&self) -> Result<Box<dyn VolumeControl>, AudioError>;
}
