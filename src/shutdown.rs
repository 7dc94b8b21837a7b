//! Cooperative shutdown signal shared by every event-source loop.
//!
//! Tripping the signal disconnects every subscribed receiver, so loops
//! blocked in a `select!` wake immediately. The signal can be tripped from
//! any thread (Ctrl+C handler, tray Quit item) and tripping twice is
//! harmless.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct ShutdownSignal {
    // Dropping the sole sender disconnects all subscribed receivers.
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    subscribers: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            subscribers: rx,
        }
    }

    /// Trip the signal. All current and future subscribers observe it.
    pub fn signal(&self) {
        self.trigger.lock().expect("shutdown trigger poisoned").take();
    }

    /// A receiver that disconnects when the signal is tripped. Use with
    /// `select!`: a recv error means shutdown.
    pub fn subscribe(&self) -> Receiver<()> {
        self.subscribers.clone()
    }

    pub fn is_signalled(&self) -> bool {
        self.trigger.lock().expect("shutdown trigger poisoned").is_none()
    }

    /// Block the calling thread until the signal is tripped.
    pub fn wait(&self) {
        // Nothing is ever sent on the channel; recv returns only on
        // disconnect.
        let _ = self.subscribers.recv();
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn subscribers_wake_on_signal() {
        let signal = ShutdownSignal::new();
        let rx = signal.subscribe();

        let waiter = thread::spawn(move || rx.recv().is_err());

        thread::sleep(Duration::from_millis(20));
        assert!(!signal.is_signalled());
        signal.signal();

        assert!(waiter.join().unwrap());
        assert!(signal.is_signalled());
    }

    #[test]
    fn late_subscribers_observe_a_tripped_signal() {
        let signal = ShutdownSignal::new();
        signal.signal();
        signal.signal(); // second trip is a no-op

        assert!(signal.subscribe().recv().is_err());
        signal.wait(); // returns immediately
    }
}
