//! Command-line front end for XPAK metadata segments.
//!
//! The `xpak` binary is a thin wrapper around this library: it parses a
//! [`ToolConfig`], initializes logging and calls [`run`].
//!
//! # Example
//!
//! ```no_run
//! use xpak_tool::{ToolConfig, run};
//!
//! let config = ToolConfig::try_from_args(["xpak", "list", "hello-1.0.tbz2"])?;
//! run(&config, &mut std::io::stdout().lock())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

pub mod commands;
pub mod config;

pub use commands::run;
pub use config::{Command, LogLevel, ToolConfig};
