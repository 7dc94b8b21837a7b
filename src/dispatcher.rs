//! Input event dispatch.
//!
//! Consumes the raw keyboard/mouse event streams produced by the platform
//! hooks, matches them against the configured binding, and turns them into
//! serialized activate/deactivate commands. Activation is submitted
//! immediately on the down event; deactivation is delayed by the
//! configured hold time on a detached timer thread so that brief key
//! chatter does not close the gate.

use crate::audio::EndpointController;
use crate::binding::{Binding, Trigger};
use crate::serializer::SerializerHandle;
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{select, Receiver};
use std::thread;
use tracing::{debug, info, trace};

/// Mouse message code for pointer motion; pure noise for binding purposes.
pub const MOUSE_MOVE_CODE: u32 = 512;

/// Press or release half of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Down,
    Up,
}

/// One raw input event from a platform hook.
///
/// `code` is the virtual-key code for keyboard events and the mouse
/// message code for mouse events; `data` carries the raw mouse auxiliary
/// data (0 for keyboard events).
#[derive(Debug, Clone, Copy)]
pub struct InputEvent {
    pub code: u32,
    pub data: u32,
    pub phase: Phase,
}

/// Queue handle the dispatcher submits against.
pub type CommandQueue = SerializerHandle<EndpointController>;

/// Per-binding state machine driving the gate from one input stream.
pub struct EventDispatcher {
    binding: Binding,
    commands: CommandQueue,
    shutdown: Receiver<()>,
}

impl EventDispatcher {
    pub fn new(binding: Binding, commands: CommandQueue, shutdown: &ShutdownSignal) -> Self {
        Self {
            binding,
            commands,
            shutdown: shutdown.subscribe(),
        }
    }

    /// Consume `events` until shutdown is signalled or the stream closes.
    ///
    /// The caller owns the hook registration backing the stream and
    /// releases it when this returns.
    pub fn run(self, events: Receiver<InputEvent>) {
        info!(trigger = ?self.binding.trigger, "start capturing input");

        // Idle/Active per binding; down events while Active (keyboard
        // auto-repeat) are not transitions.
        let mut active = false;

        loop {
            select! {
                recv(self.shutdown) -> _ => break,
                recv(events) -> event => match event {
                    Ok(event) => self.handle_event(event, &mut active),
                    Err(_) => break,
                },
            }
        }

        info!(trigger = ?self.binding.trigger, "input listener shutting down");
    }

    fn handle_event(&self, event: InputEvent, active: &mut bool) {
        match self.binding.trigger {
            Trigger::Key { code } => {
                if event.code != code {
                    return;
                }
                match event.phase {
                    Phase::Down => self.press(active),
                    Phase::Up => self.release(active),
                }
            }
            Trigger::MouseButton { down, up } => {
                // XBUTTON1/XBUTTON2 share message codes; the data filter
                // applies to both phases before any matching.
                if let Some(filter) = self.binding.data_filter {
                    if event.data != filter {
                        return;
                    }
                }
                if event.code == down {
                    self.press(active);
                } else if event.code == up {
                    self.release(active);
                }
            }
        }
    }

    /// Idle → Active: open the gate immediately.
    fn press(&self, active: &mut bool) {
        if *active {
            trace!("repeat down event while active, ignoring");
            return;
        }
        *active = true;
        debug!("trigger down");
        if self.commands.submit(|ctl| ctl.activate()).is_err() {
            debug!("activation dropped, serializer already closed");
        }
    }

    /// Active → Idle: close the gate after the hold time elapses.
    ///
    /// The delay runs on a detached thread so new activations are never
    /// blocked behind it; only the final submit is serialized. A pending
    /// deactivation is not cancelled by a new activation: both race and
    /// the last submit wins.
    fn release(&self, active: &mut bool) {
        if !*active {
            trace!("up event while idle, ignoring");
            return;
        }
        *active = false;
        debug!("trigger up, holding");

        let commands = self.commands.clone();
        let hold = self.binding.hold_time;
        thread::spawn(move || {
            thread::sleep(hold);
            if commands.submit(|ctl| ctl.deactivate()).is_err() {
                debug!("deactivation dropped, serializer already closed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EndpointController, MemoryDirectory};
    use crate::binding::ActivationMode;
    use crate::serializer;
    use crate::ui::MemoryStatusSink;
    use crossbeam_channel::{unbounded, Sender};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn key(code: u32, phase: Phase) -> InputEvent {
        InputEvent { code, data: 0, phase }
    }

    fn mouse(code: u32, data: u32, phase: Phase) -> InputEvent {
        InputEvent { code, data, phase }
    }

    /// Poll a predicate against shared state with a timeout.
    fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        pred()
    }

    struct Harness {
        directory: MemoryDirectory,
        events: Sender<InputEvent>,
        shutdown: ShutdownSignal,
        commands: CommandQueue,
        dispatcher: thread::JoinHandle<()>,
    }

    impl Harness {
        fn finish(self) {
            self.shutdown.signal();
            drop(self.events);
            self.dispatcher.join().unwrap();
            self.commands.close();
        }
    }

    /// Wire a dispatcher to a real controller over a memory directory.
    ///
    /// The controller is deliberately not `Send`, so the serializer runs
    /// on the test thread (as it does on the main thread in the binary)
    /// while `driver` exercises the session from a side thread. The
    /// device starts muted, as it would after `prepare_startup`.
    fn run_session(binding: Binding, driver: impl FnOnce(Harness) + Send + 'static) {
        let directory = MemoryDirectory::new();
        directory.add_device("Test Mic", true);

        let controller = EndpointController::new(
            Box::new(directory.clone()),
            Arc::new(MemoryStatusSink::new()),
            ActivationMode::Mute,
        );

        let (commands, runner) = serializer::channel();
        let shutdown = ShutdownSignal::new();
        let (event_tx, event_rx) = unbounded();

        let dispatcher = EventDispatcher::new(binding, commands.clone(), &shutdown);
        let dispatcher = thread::spawn(move || dispatcher.run(event_rx));

        let harness = Harness {
            directory,
            events: event_tx,
            shutdown,
            commands,
            dispatcher,
        };
        let driver = thread::spawn(move || driver(harness));

        runner.run(controller);
        driver.join().unwrap();
    }

    #[test]
    fn key_down_activates_immediately_and_up_deactivates_after_hold() {
        let hold = Duration::from_millis(80);
        let binding =
            Binding::new(Trigger::Key { code: 65 }, ActivationMode::Mute).with_hold_time(hold);

        run_session(binding, move |harness| {
            harness.events.send(key(65, Phase::Down)).unwrap();
            assert!(wait_until(Duration::from_secs(1), || {
                harness.directory.mute_of("Test Mic") == Some(false)
            }));

            let released = Instant::now();
            harness.events.send(key(65, Phase::Up)).unwrap();
            assert!(wait_until(Duration::from_secs(2), || {
                harness.directory.mute_of("Test Mic") == Some(true)
            }));
            assert!(released.elapsed() >= hold);

            harness.finish();
        });
    }

    #[test]
    fn auto_repeat_down_events_do_not_resubmit() {
        let binding = Binding::new(Trigger::Key { code: 65 }, ActivationMode::Mute)
            .with_hold_time(Duration::from_millis(10));

        run_session(binding, |harness| {
            for _ in 0..5 {
                harness.events.send(key(65, Phase::Down)).unwrap();
            }
            assert!(wait_until(Duration::from_secs(1), || {
                harness.directory.mute_of("Test Mic") == Some(false)
            }));

            // One unmute mutation for the whole burst.
            assert_eq!(harness.directory.mute_mutations("Test Mic"), 1);

            harness.finish();
        });
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        let binding = Binding::new(Trigger::Key { code: 65 }, ActivationMode::Mute)
            .with_hold_time(Duration::from_millis(10));

        run_session(binding, |harness| {
            harness.events.send(key(66, Phase::Down)).unwrap();
            // A matching event afterwards proves the earlier one was
            // consumed without effect (the stream is processed in order).
            harness.events.send(key(65, Phase::Down)).unwrap();
            assert!(wait_until(Duration::from_secs(1), || {
                harness.directory.mute_of("Test Mic") == Some(false)
            }));
            assert_eq!(harness.directory.mute_mutations("Test Mic"), 1);

            harness.finish();
        });
    }

    #[test]
    fn mouse_data_filter_gates_matching() {
        let binding = Binding::new(
            Trigger::MouseButton { down: 523, up: 524 },
            ActivationMode::Mute,
        )
        .with_data_filter(Some(131072))
        .with_hold_time(Duration::from_millis(10));

        run_session(binding, |harness| {
            // Same message code, wrong data: must not trigger.
            harness.events.send(mouse(523, 65536, Phase::Down)).unwrap();
            harness.events.send(mouse(523, 131072, Phase::Down)).unwrap();

            assert!(wait_until(Duration::from_secs(1), || {
                harness.directory.mute_of("Test Mic") == Some(false)
            }));
            assert_eq!(harness.directory.mute_mutations("Test Mic"), 1);

            harness.finish();
        });
    }

    #[test]
    fn rapid_press_release_press_does_not_deadlock() {
        let hold = Duration::from_millis(30);
        let binding =
            Binding::new(Trigger::Key { code: 65 }, ActivationMode::Mute).with_hold_time(hold);

        run_session(binding, move |harness| {
            // Down/Up/Down inside the hold window: the pending
            // deactivation races the new activation. The final state is
            // not asserted, only that everything completes.
            harness.events.send(key(65, Phase::Down)).unwrap();
            harness.events.send(key(65, Phase::Up)).unwrap();
            harness.events.send(key(65, Phase::Down)).unwrap();
            harness.events.send(key(65, Phase::Up)).unwrap();

            thread::sleep(hold * 3);
            assert!(harness.directory.mute_of("Test Mic").is_some());

            harness.finish();
        });
    }
}
