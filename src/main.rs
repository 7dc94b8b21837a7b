//! mic-gate entry point.

use anyhow::Result;
use clap::Parser;
use mic_gate::config::{Cli, RunConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mic_gate=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RunConfig::from_cli(&cli)?;
    run(config)
}

#[cfg(windows)]
fn run(config: RunConfig) -> Result<()> {
    mic_gate::app::run(config)
}

#[cfg(not(windows))]
fn run(_config: RunConfig) -> Result<()> {
    anyhow::bail!("mic-gate drives the Windows Core Audio stack; this platform has no backend")
}
