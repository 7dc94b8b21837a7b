//! Bind-discovery mode.
//!
//! Instead of acting on input, discovery mode logs every qualifying raw
//! event so the user can find the right VK/mouse codes for a binding.
//! Pointer motion is filtered out to keep the log usable. No mute or
//! volume command is ever issued in this mode.

use crate::dispatcher::{InputEvent, Phase, MOUSE_MOVE_CODE};
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{select, Receiver};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Which hook a discovery loop is reading from; selects the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Mouse,
}

/// Append-only sink for discovered bind lines.
pub trait BindSink: Send + Sync {
    fn record(&self, line: &str);
}

/// Appends lines to the bind log file, flushing per line so the log can
/// be followed while the program runs.
pub struct FileBindSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileBindSink {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl BindSink for FileBindSink {
    fn record(&self, line: &str) {
        let mut writer = self.writer.lock().expect("bind log poisoned");
        if writeln!(writer, "{line}").and_then(|()| writer.flush()).is_err() {
            warn!("failed to append to bind log");
        }
    }
}

/// Capturing sink for tests.
#[derive(Default)]
pub struct MemoryBindSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryBindSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl BindSink for MemoryBindSink {
    fn record(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Consume one hook's event stream, recording each qualifying event until
/// shutdown is signalled or the stream closes.
pub fn run_discovery(
    source: InputSource,
    events: Receiver<InputEvent>,
    sink: &dyn BindSink,
    shutdown: &ShutdownSignal,
) {
    let shutdown = shutdown.subscribe();
    info!(?source, "start capturing input for bind discovery");

    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(events) -> event => match event {
                Ok(event) => {
                    if let Some(line) = format_event(source, event) {
                        info!("{line}");
                        sink.record(&line);
                    }
                }
                Err(_) => break,
            },
        }
    }

    info!(?source, "discovery listener shutting down");
}

/// Render one event as a bind-log line, or `None` for motion noise.
fn format_event(source: InputSource, event: InputEvent) -> Option<String> {
    match source {
        InputSource::Mouse => {
            if event.code == MOUSE_MOVE_CODE {
                return None;
            }
            Some(format!("Mouse VK: {} Data: {}", event.code, event.data))
        }
        InputSource::Keyboard => Some(match event.phase {
            Phase::Down => format!("Key Down VK WM_KEYDOWN {}", event.code),
            Phase::Up => format!("Key Up WM_KEYUP {}", event.code),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    #[test]
    fn formats_key_and_mouse_lines() {
        let down = InputEvent { code: 65, data: 0, phase: Phase::Down };
        let up = InputEvent { code: 65, data: 0, phase: Phase::Up };
        let button = InputEvent { code: 523, data: 131072, phase: Phase::Down };

        assert_eq!(
            format_event(InputSource::Keyboard, down).as_deref(),
            Some("Key Down VK WM_KEYDOWN 65")
        );
        assert_eq!(
            format_event(InputSource::Keyboard, up).as_deref(),
            Some("Key Up WM_KEYUP 65")
        );
        assert_eq!(
            format_event(InputSource::Mouse, button).as_deref(),
            Some("Mouse VK: 523 Data: 131072")
        );
    }

    #[test]
    fn motion_noise_is_filtered() {
        let motion = InputEvent { code: MOUSE_MOVE_CODE, data: 0, phase: Phase::Down };
        assert_eq!(format_event(InputSource::Mouse, motion), None);
    }

    #[test]
    fn loop_records_qualifying_events_and_exits_on_stream_close() {
        let sink = MemoryBindSink::new();
        let shutdown = ShutdownSignal::new();
        let (tx, rx) = unbounded();

        tx.send(InputEvent { code: 523, data: 131072, phase: Phase::Down }).unwrap();
        tx.send(InputEvent { code: MOUSE_MOVE_CODE, data: 0, phase: Phase::Down }).unwrap();
        tx.send(InputEvent { code: 524, data: 131072, phase: Phase::Up }).unwrap();
        drop(tx);

        run_discovery(InputSource::Mouse, rx, &sink, &shutdown);

        assert_eq!(
            sink.lines(),
            vec![
                "Mouse VK: 523 Data: 131072".to_string(),
                "Mouse VK: 524 Data: 131072".to_string(),
            ]
        );
    }

    #[test]
    fn loop_exits_on_shutdown_signal() {
        let shutdown = ShutdownSignal::new();
        let (_tx, rx) = unbounded::<InputEvent>();

        let loop_shutdown = shutdown.clone();
        let handle = thread::spawn(move || {
            run_discovery(InputSource::Keyboard, rx, &MemoryBindSink::new(), &loop_shutdown);
        });

        shutdown.signal();
        handle.join().unwrap();
    }
}
