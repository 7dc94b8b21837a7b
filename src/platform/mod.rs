//! Platform-specific module for Windows bindings.
//!
//! Everything that touches a Win32 API lives here: the Core Audio device
//! directory, the low-level input hooks, the COM lifetime guard, and the
//! single-instance mutex. The rest of the crate consumes these only
//! through the traits and channels in the core modules.

pub mod com;
pub mod hooks;
pub mod singleton;
pub mod wasapi;

pub use com::ComGuard;
pub use hooks::{install_keyboard_hook, install_mouse_hook, HookError, InputHook};
pub use singleton::{InstanceGuard, SingletonError};
pub use wasapi::WasapiDirectory;
