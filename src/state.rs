//! Process-lifetime engine state.

use std::collections::BTreeSet;

/// Baseline mute state of one capture device, collected at startup before
/// any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub device_name: String,
    pub was_muted: bool,
}

/// Mutable state that lives for the whole run.
///
/// Written only from the serializer's execution context: the controller
/// updates `last_device_name` and `used_devices` as devices are engaged,
/// and `restore_volume` is captured once at startup in volume mode.
/// The immutable configuration (hold time, mode) lives on [`crate::binding::Binding`].
#[derive(Debug, Default)]
pub struct EngineState {
    /// Friendly name of the most recently engaged default device, for
    /// display.
    pub last_device_name: Option<String>,

    /// Names of devices this run actually touched; only these are restored
    /// at shutdown.
    pub used_devices: BTreeSet<String>,

    /// Master volume level to restore when the gate opens in volume mode,
    /// captured before the level is zeroed at startup.
    pub restore_volume: f32,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` is now the engaged default device. Returns true
    /// if the name changed since the last engagement.
    pub fn mark_engaged(&mut self, name: &str) -> bool {
        self.used_devices.insert(name.to_string());
        let changed = self.last_device_name.as_deref() != Some(name);
        if changed {
            self.last_device_name = Some(name.to_string());
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_engaged_tracks_used_devices_and_name_changes() {
        let mut state = EngineState::new();

        assert!(state.mark_engaged("Headset Mic"));
        assert!(!state.mark_engaged("Headset Mic"));
        assert!(state.mark_engaged("USB Mic"));

        assert_eq!(state.last_device_name.as_deref(), Some("USB Mic"));
        assert_eq!(state.used_devices.len(), 2);
    }
}
