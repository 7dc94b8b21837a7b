//! Input binding data models.
//!
//! A binding describes one configured trigger: which key or mouse button
//! gates the microphone, how long the gate stays open after release, and
//! whether engaging the gate toggles mute or ducks the volume level.

use std::time::Duration;
use thiserror::Error;

/// Default hold time applied when none is configured.
pub const DEFAULT_HOLD_TIME_MS: u64 = 500;

/// What engaging the gate does to the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    /// Toggle the endpoint mute flag (default).
    Mute,

    /// Set the master volume level to 0 instead of muting.
    Volume,
}

/// The input that drives a binding.
///
/// A mouse trigger always carries both the down and the up message code;
/// a half-configured pair is rejected at the configuration layer, so it is
/// unrepresentable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A keyboard key, identified by its virtual-key code.
    Key { code: u32 },

    /// A mouse button, identified by its down and up message codes
    /// (e.g. 523/524 for XBUTTON down/up).
    MouseButton { down: u32, up: u32 },
}

/// One configured trigger, immutable after startup.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Key or mouse button driving this binding.
    pub trigger: Trigger,

    /// Optional raw mouse-data filter. XBUTTON1 and XBUTTON2 share message
    /// codes and differ only in this value (65536 vs 131072); when set,
    /// events with other data are ignored. Not consulted for keyboard
    /// triggers.
    pub data_filter: Option<u32>,

    /// How long the gate stays open after the release event.
    pub hold_time: Duration,

    /// Mute or volume-ducking behavior on engage/disengage.
    pub mode: ActivationMode,
}

impl Binding {
    pub fn new(trigger: Trigger, mode: ActivationMode) -> Self {
        Self {
            trigger,
            data_filter: None,
            hold_time: Duration::from_millis(DEFAULT_HOLD_TIME_MS),
            mode,
        }
    }

    pub fn with_data_filter(mut self, filter: Option<u32>) -> Self {
        self.data_filter = filter;
        self
    }

    pub fn with_hold_time(mut self, hold_time: Duration) -> Self {
        self.hold_time = hold_time;
        self
    }
}

/// Binding parse/validation error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("unrecognized key code: {0:?} (expected a number like \"65\" or a name like \"VK_A\")")]
    UnrecognizedKeyCode(String),
}

/// Parse a configured key code string into a virtual-key code.
///
/// Accepts a plain decimal code ("65"), a `VK_`-prefixed letter or digit
/// ("VK_A", "VK_0"), or a `VK_`-prefixed function key ("VK_F13").
pub fn parse_key_code(input: &str) -> Result<u32, BindingError> {
    let trimmed = input.trim();

    if let Ok(code) = trimmed.parse::<u32>() {
        return Ok(code);
    }

    if let Some(name) = trimmed.strip_prefix("VK_").or_else(|| trimmed.strip_prefix("vk_")) {
        // Function keys: VK_F1..VK_F24 map to 0x70..0x87.
        if let Some(number) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(n) = number.parse::<u32>() {
                if (1..=24).contains(&n) {
                    return Ok(0x70 + n - 1);
                }
            }
        }

        // Letters and digits share their ASCII uppercase value.
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphanumeric() {
                return Ok(c.to_ascii_uppercase() as u32);
            }
        }
    }

    Err(BindingError::UnrecognizedKeyCode(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_decimal_codes() {
        assert_eq!(parse_key_code("65"), Ok(65));
        assert_eq!(parse_key_code(" 123 "), Ok(123));
    }

    #[test]
    fn parses_vk_letter_and_digit_names() {
        assert_eq!(parse_key_code("VK_A"), Ok(65));
        assert_eq!(parse_key_code("vk_z"), Ok(90));
        assert_eq!(parse_key_code("VK_0"), Ok(48));
    }

    #[test]
    fn parses_vk_function_keys() {
        assert_eq!(parse_key_code("VK_F1"), Ok(0x70));
        assert_eq!(parse_key_code("VK_F13"), Ok(0x7C));
        assert_eq!(parse_key_code("VK_F24"), Ok(0x87));
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(parse_key_code("VK_F25").is_err());
        assert!(parse_key_code("VK_CTRL_A").is_err());
        assert!(parse_key_code("hold-to-talk").is_err());
    }

    #[test]
    fn builder_defaults() {
        let binding = Binding::new(Trigger::Key { code: 65 }, ActivationMode::Mute);
        assert_eq!(binding.hold_time, Duration::from_millis(DEFAULT_HOLD_TIME_MS));
        assert_eq!(binding.data_filter, None);
    }
}
