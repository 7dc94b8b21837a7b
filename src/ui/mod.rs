//! Status notification surface.
//!
//! The core reports state changes through the [`StatusSink`] trait and
//! never depends on a concrete UI. The tray implementation lives in
//! `tray` (Windows only); `NullStatusSink` serves headless runs and
//! `MemoryStatusSink` captures calls for tests.

#[cfg(windows)]
pub mod icons;
#[cfg(windows)]
pub mod tray;

use std::sync::{Arc, Mutex};

/// Fire-and-forget status notifications consumed by the tray icon.
///
/// Implementations must tolerate being called from the serializer thread;
/// none of these calls return anything to the core.
pub trait StatusSink: Send + Sync {
    /// The gate state changed: `muted` is the user-visible mute state.
    fn set_status_icon(&self, muted: bool);

    /// The engaged default device changed; `title` is its friendly name.
    fn set_display_title(&self, title: &str);

    /// Add a static informational line (configured binding, hold time).
    fn add_info_line(&self, line: &str);
}

/// Type alias for a shared status sink.
pub type StatusSinkRef = Arc<dyn StatusSink>;

/// Discards all notifications.
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn set_status_icon(&self, _muted: bool) {}
    fn set_display_title(&self, _title: &str) {}
    fn add_info_line(&self, _line: &str) {}
}

/// A captured notification from [`MemoryStatusSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Icon { muted: bool },
    Title(String),
    Info(String),
}

/// Capturing status sink for tests.
#[derive(Default)]
pub struct MemoryStatusSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of icon-change notifications received.
    pub fn icon_changes(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, StatusEvent::Icon { .. }))
            .count()
    }

    pub fn last_title(&self) -> Option<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|e| match e {
                StatusEvent::Title(title) => Some(title.clone()),
                _ => None,
            })
    }
}

impl StatusSink for MemoryStatusSink {
    fn set_status_icon(&self, muted: bool) {
        self.events.lock().unwrap().push(StatusEvent::Icon { muted });
    }

    fn set_display_title(&self, title: &str) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::Title(title.to_string()));
    }

    fn add_info_line(&self, line: &str) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::Info(line.to_string()));
    }
}
