//! xpak binary entry point.
//!
//! Parses arguments, initializes logging on stderr and runs the selected
//! subcommand with stdout as the report sink.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use xpak_tool::{ToolConfig, run};

fn main() -> Result<()> {
    let config = ToolConfig::from_args();

    // RUST_LOG wins over --log-level
    let level = Level::from(config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("running {:?}", config.command);

    let stdout = std::io::stdout();
    run(&config, &mut stdout.lock())?;
    Ok(())
}
