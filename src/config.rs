//! Command-line configuration.
//!
//! The flags are parsed once at startup into an immutable [`RunConfig`]
//! that the dispatcher and controller borrow for the rest of the run.

use crate::binding::{
    parse_key_code, ActivationMode, Binding, BindingError, Trigger, DEFAULT_HOLD_TIME_MS,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(
    name = "mic-gate",
    about = "Hold a key or mouse button to open the microphone; release to mute it again."
)]
pub struct Cli {
    /// Key to hold, as a decimal VK code ("65") or a VK_ name ("VK_A")
    #[arg(short = 'k', long = "keybind")]
    pub keybind: Option<String>,

    /// Mouse-down message code (e.g. 523); set together with --mouseup
    #[arg(long = "mousedown", visible_alias = "md")]
    pub mousedown: Option<u32>,

    /// Mouse-up message code (e.g. 524); set together with --mousedown
    #[arg(long = "mouseup", visible_alias = "mu")]
    pub mouseup: Option<u32>,

    /// Raw mouse data to match (131072 for mouse3, 65536 for mouse4);
    /// without it all data is accepted
    #[arg(long = "mousedata", visible_alias = "mdata")]
    pub mousedata: Option<u32>,

    /// Milliseconds the mic stays open after release
    #[arg(long = "holdtime", visible_alias = "h", default_value_t = DEFAULT_HOLD_TIME_MS)]
    pub holdtime: u64,

    /// Duck the volume to 0 instead of muting
    #[arg(long = "volume")]
    pub volume: bool,

    /// Bind-discovery mode: log raw input codes instead of acting on them
    #[arg(long = "keybindmode")]
    pub keybindmode: bool,

    /// Where discovery mode appends its log lines
    #[arg(long = "bindlog", default_value = "binds.log")]
    pub bindlog: PathBuf,
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Immutable run configuration derived from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub keyboard: Option<Binding>,
    pub mouse: Option<Binding>,
    pub mode: ActivationMode,
    pub hold_time: Duration,
    pub discovery: bool,
    pub bind_log: PathBuf,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mode = if cli.volume {
            ActivationMode::Volume
        } else {
            ActivationMode::Mute
        };
        let hold_time = Duration::from_millis(cli.holdtime);

        // Discovery mode only observes; any configured bindings are
        // ignored for the run, as is the mode flag.
        if cli.keybindmode {
            return Ok(Self {
                keyboard: None,
                mouse: None,
                mode: ActivationMode::Mute,
                hold_time,
                discovery: true,
                bind_log: cli.bindlog.clone(),
            });
        }

        let keyboard = match &cli.keybind {
            Some(raw) => {
                let code = parse_key_code(raw)?;
                Some(Binding::new(Trigger::Key { code }, mode).with_hold_time(hold_time))
            }
            None => None,
        };

        let mouse = match (cli.mousedown, cli.mouseup) {
            (Some(down), Some(up)) => Some(
                Binding::new(Trigger::MouseButton { down, up }, mode)
                    .with_data_filter(cli.mousedata)
                    .with_hold_time(hold_time),
            ),
            (None, None) => None,
            _ => {
                warn!("mouse binding needs both --mousedown and --mouseup, ignoring it");
                None
            }
        };

        if keyboard.is_none() && mouse.is_none() {
            warn!("no trigger configured; the microphone will stay gated until shutdown");
        }

        Ok(Self {
            keyboard,
            mouse,
            mode,
            hold_time,
            discovery: false,
            bind_log: cli.bindlog.clone(),
        })
    }

    pub fn has_bindings(&self) -> bool {
        self.keyboard.is_some() || self.mouse.is_some()
    }
}
