//! Mic Gate - Library
//!
//! A push-to-talk gate for the default capture device: while a bound key
//! or mouse button is held the microphone is open; on release it closes
//! again after a configurable hold time.
//!
//! ## Architecture
//!
//! - Raw input events come from low-level hooks, each on its own thread
//! - The dispatcher matches events against the configured binding and
//!   submits activate/deactivate commands
//! - A single-worker serializer executes every command on the one thread
//!   that owns the COM apartment and the endpoint handles
//! - Device baselines are snapshotted at startup and restored at exit
//!
//! The core is platform-agnostic and fully testable against the
//! in-memory device directory; only `platform` and the tray talk to
//! Windows.

pub mod audio;
pub mod binding;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod serializer;
pub mod shutdown;
pub mod state;
pub mod ui;

#[cfg(windows)]
pub mod app;
#[cfg(windows)]
pub mod platform;

pub use audio::{AudioError, DeviceDirectory, EndpointController, VolumeControl};
pub use binding::{ActivationMode, Binding, Trigger};
pub use config::{Cli, RunConfig};
pub use dispatcher::{EventDispatcher, InputEvent, Phase};
pub use serializer::{SerializerClosed, SerializerHandle, SerializerRunner};
pub use shutdown::ShutdownSignal;
pub use state::{DeviceSnapshot, EngineState};
