//! Audio endpoint control.
//!
//! This module provides the capture-device capabilities the core consumes
//! (`DeviceDirectory`, `VolumeControl`), the idempotent endpoint
//! controller, and the startup/shutdown device-state manager.

pub mod controller;
pub mod device;
pub mod memory;
pub mod snapshot;

pub use controller::EndpointController;
pub use device::{AudioError, DeviceDirectory, VolumeControl};
pub use memory::MemoryDirectory;
pub use snapshot::DeviceStateManager;
