//! Endpoint mute/volume control with idempotent state transitions.
//!
//! Owns the device directory handle and all run-time audio state. Every
//! method that mutates a device is expected to execute inside the
//! serializer's execution context; the hook threads only ever reach this
//! type through submitted closures.

use super::device::{AudioError, DeviceDirectory, VolumeControl};
use super::snapshot::DeviceStateManager;
use crate::binding::ActivationMode;
use crate::state::EngineState;
use crate::ui::StatusSinkRef;
use tracing::{info, warn};

pub struct EndpointController {
    directory: Box<dyn DeviceDirectory>,
    status: StatusSinkRef,
    mode: ActivationMode,
    state: EngineState,
    restorer: DeviceStateManager,
}

impl EndpointController {
    pub fn new(directory: Box<dyn DeviceDirectory>, status: StatusSinkRef, mode: ActivationMode) -> Self {
        Self {
            directory,
            status,
            mode,
            state: EngineState::new(),
            restorer: DeviceStateManager::new(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Capture the baseline mute state of every capture device. Must run
    /// before `prepare_startup` forces the default device into the gated
    /// state.
    pub fn snapshot_baseline(&mut self) -> Result<(), AudioError> {
        self.restorer.snapshot_all(self.directory.as_ref())
    }

    /// Force the default device into the gated state for the run.
    ///
    /// In volume mode the current master level is captured first so that
    /// activation and shutdown can restore it. Errors propagate so the
    /// caller can surface a gate that failed to close at startup.
    pub fn prepare_startup(&mut self) -> Result<(), AudioError> {
        let device = self.directory.default_capture()?;
        self.note_engaged(device.as_ref());

        match self.mode {
            ActivationMode::Mute => {
                let muted = device.get_mute().unwrap_or_else(|err| {
                    warn!(device = device.name(), error = %err, "mute query failed, assuming unmuted");
                    false
                });
                if !muted {
                    device.set_mute(true)?;
                }
                info!("microphone gated (muted) at startup");
            }
            ActivationMode::Volume => {
                self.state.restore_volume = match device.get_volume() {
                    Ok(level) => level,
                    Err(err) => {
                        warn!(error = %err, "could not read startup volume, will restore to 0");
                        0.0
                    }
                };
                device.set_volume(0.0)?;
                info!(restore = self.state.restore_volume, "volume zeroed at startup");
            }
        }

        self.status.set_status_icon(true);
        Ok(())
    }

    /// Open the gate: unmute (or restore the captured level on) the
    /// current default device.
    pub fn activate(&mut self) {
        let Some(device) = self.engage_default() else {
            return;
        };
        match self.mode {
            ActivationMode::Mute => self.set_mute_state(device.as_ref(), false),
            ActivationMode::Volume => {
                let level = self.state.restore_volume;
                self.set_volume_level(device.as_ref(), level);
            }
        }
    }

    /// Close the gate: mute (or zero the level on) the current default
    /// device.
    pub fn deactivate(&mut self) {
        let Some(device) = self.engage_default() else {
            return;
        };
        match self.mode {
            ActivationMode::Mute => self.set_mute_state(device.as_ref(), true),
            ActivationMode::Volume => self.set_volume_level(device.as_ref(), 0.0),
        }
    }

    /// Current mute state of `device`, or `DeviceQuery` if the handle is
    /// stale or the device vanished.
    pub fn mute_state(&self, device: &dyn VolumeControl) -> Result<bool, AudioError> {
        device.get_mute()
    }

    /// Set the mute state, skipping the platform call (and the status
    /// callback) when the device is already there.
    pub fn set_mute_state(&self, device: &dyn VolumeControl, desired: bool) {
        let current = self.mute_state(device).unwrap_or_else(|err| {
            warn!(device = device.name(), error = %err, "mute query failed, assuming unmuted");
            false
        });
        if current == desired {
            return;
        }

        if let Err(err) = device.set_mute(desired) {
            warn!(device = device.name(), error = %err, "failed to set mute state");
            return;
        }
        self.status.set_status_icon(desired);
        info!(device = device.name(), muted = desired, "mute state set");
    }

    /// Set the master volume level with the same idempotent pattern.
    pub fn set_volume_level(&self, device: &dyn VolumeControl, desired: f32) {
        let current = device.get_volume().unwrap_or_else(|err| {
            warn!(device = device.name(), error = %err, "volume query failed, assuming 0");
            0.0
        });
        if (current - desired).abs() < f32::EPSILON {
            return;
        }

        if let Err(err) = device.set_volume(desired) {
            warn!(device = device.name(), error = %err, "failed to set volume level");
            return;
        }
        self.status.set_status_icon(desired <= 0.0);
        info!(device = device.name(), level = desired, "volume level set");
    }

    /// Restore every touched device to its pre-run state.
    pub fn restore_on_shutdown(&mut self) {
        match self.mode {
            ActivationMode::Mute => {
                info!("restoring baseline mute state before shutdown");
                self.restorer
                    .restore(self.directory.as_ref(), &self.state.used_devices);
            }
            ActivationMode::Volume => match self.directory.default_capture() {
                Ok(device) => {
                    info!(level = self.state.restore_volume, "restoring volume before shutdown");
                    self.set_volume_level(device.as_ref(), self.state.restore_volume);
                }
                Err(err) => warn!(error = %err, "no default device for volume restore"),
            },
        }
    }

    /// Resolve the current default device, refreshing the displayed name
    /// and the used-devices set. The lookup runs on every engagement
    /// because the default device may change mid-run.
    fn engage_default(&mut self) -> Option<Box<dyn VolumeControl>> {
        match self.directory.default_capture() {
            Ok(device) => {
                self.note_engaged(device.as_ref());
                Some(device)
            }
            Err(err) => {
                warn!(error = %err, "no default capture device");
                None
            }
        }
    }

    fn note_engaged(&mut self, device: &dyn VolumeControl) {
        if self.state.mark_engaged(device.name()) {
            info!(device = device.name(), "input device");
            self.status.set_display_title(device.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::memory::MemoryDirectory;
    use crate::ui::{MemoryStatusSink, StatusEvent};
    use std::sync::Arc;

    fn controller(
        directory: &MemoryDirectory,
        mode: ActivationMode,
    ) -> (EndpointController, Arc<MemoryStatusSink>) {
        let sink = Arc::new(MemoryStatusSink::new());
        let controller = EndpointController::new(Box::new(directory.clone()), sink.clone(), mode);
        (controller, sink)
    }

    #[test]
    fn set_mute_is_idempotent_with_single_status_callback() {
        let directory = MemoryDirectory::new();
        directory.add_device("Headset Mic", false);
        let (mut ctl, sink) = controller(&directory, ActivationMode::Mute);

        ctl.deactivate();
        ctl.deactivate();

        assert_eq!(directory.mute_mutations("Headset Mic"), 1);
        assert_eq!(sink.icon_changes(), 1);
        assert_eq!(directory.mute_of("Headset Mic"), Some(true));
    }

    #[test]
    fn failed_mute_query_is_treated_as_unmuted() {
        let directory = MemoryDirectory::new();
        directory.add_device("Flaky Mic", true);
        directory.set_fail_queries("Flaky Mic", true);
        let (mut ctl, _sink) = controller(&directory, ActivationMode::Mute);

        // The device is actually muted, but the unreadable state is taken
        // as unmuted, so the deactivate issues a (redundant) mutation
        // rather than silently skipping it.
        ctl.deactivate();
        assert_eq!(directory.mute_mutations("Flaky Mic"), 1);
    }

    #[test]
    fn engagement_updates_title_once_per_device() {
        let directory = MemoryDirectory::new();
        directory.add_device("Headset Mic", false);
        let (mut ctl, sink) = controller(&directory, ActivationMode::Mute);

        ctl.activate();
        ctl.deactivate();
        ctl.activate();

        let titles: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, StatusEvent::Title(_)))
            .collect();
        assert_eq!(titles, vec![StatusEvent::Title("Headset Mic".into())]);
        assert!(ctl.state().used_devices.contains("Headset Mic"));
    }

    #[test]
    fn default_device_change_is_picked_up_mid_run() {
        let directory = MemoryDirectory::new();
        directory.add_device("Old Mic", false);
        directory.add_device("New Mic", false);
        let (mut ctl, sink) = controller(&directory, ActivationMode::Mute);

        ctl.deactivate();
        directory.set_default("New Mic");
        ctl.deactivate();

        assert_eq!(directory.mute_of("New Mic"), Some(true));
        assert_eq!(sink.last_title().as_deref(), Some("New Mic"));
        assert!(ctl.state().used_devices.contains("Old Mic"));
        assert!(ctl.state().used_devices.contains("New Mic"));
    }

    #[test]
    fn missing_default_device_is_a_logged_no_op() {
        let directory = MemoryDirectory::new();
        let (mut ctl, sink) = controller(&directory, ActivationMode::Mute);

        ctl.activate();
        ctl.deactivate();
        assert_eq!(sink.icon_changes(), 0);
    }

    #[test]
    fn volume_mode_captures_and_restores_the_startup_level() {
        let directory = MemoryDirectory::new();
        directory.add_device("Headset Mic", false);
        directory.set_volume_of("Headset Mic", 0.8);
        let (mut ctl, _sink) = controller(&directory, ActivationMode::Volume);

        ctl.snapshot_baseline().unwrap();
        ctl.prepare_startup().unwrap();
        assert_eq!(directory.volume_of("Headset Mic"), Some(0.0));

        ctl.activate();
        assert_eq!(directory.volume_of("Headset Mic"), Some(0.8));

        ctl.deactivate();
        assert_eq!(directory.volume_of("Headset Mic"), Some(0.0));

        ctl.restore_on_shutdown();
        assert_eq!(directory.volume_of("Headset Mic"), Some(0.8));
    }

    #[test]
    fn mute_mode_round_trips_through_shutdown() {
        let directory = MemoryDirectory::new();
        directory.add_device("Headset Mic", false);
        let (mut ctl, _sink) = controller(&directory, ActivationMode::Mute);

        ctl.snapshot_baseline().unwrap();
        ctl.prepare_startup().unwrap();
        assert_eq!(directory.mute_of("Headset Mic"), Some(true));

        ctl.activate();
        assert_eq!(directory.mute_of("Headset Mic"), Some(false));

        ctl.restore_on_shutdown();
        assert_eq!(directory.mute_of("Headset Mic"), Some(false));
    }
}
