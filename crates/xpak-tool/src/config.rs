//! Command-line configuration.
//!
//! Options come from CLI arguments with environment fallbacks:
//! - `--log-level` / `XPAK_LOG_LEVEL` (default `warn`)
//! - `--in-place` / `XPAK_IN_PLACE` (default atomic rewrites)
//!
//! `RUST_LOG`, when set, overrides `--log-level`.
//!
//! # Example
//!
//! ```
//! use xpak_tool::{Command, ToolConfig};
//! use xpak_formats::ReplaceMode;
//!
//! let config = ToolConfig::try_from_args(["xpak", "--in-place", "strip", "pkg.tbz2"]).unwrap();
//! assert_eq!(config.replace_mode(), ReplaceMode::InPlace);
//! assert!(matches!(config.command, Command::Strip { .. }));
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::Level;
use xpak_formats::ReplaceMode;

/// Tool configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "xpak",
    about = "Inspect and edit metadata segments appended to binary packages",
    version
)]
pub struct ToolConfig {
    /// Logging level, overridden by `RUST_LOG`
    #[arg(
        short,
        long,
        value_enum,
        global = true,
        env = "XPAK_LOG_LEVEL",
        default_value = "warn"
    )]
    pub log_level: LogLevel,

    /// Truncate and append instead of renaming a rewritten copy
    #[arg(long, global = true, env = "XPAK_IN_PLACE")]
    pub in_place: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Logging verbosity
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Locate and cache decisions
    Debug,
    /// Mutations
    Info,
    /// Suspicious files
    Warn,
    /// Errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Operations on host files and standalone segment files
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show where the segment of a host file lives
    Info {
        /// Host file
        host: PathBuf,
    },

    /// List entry names of a host file
    List {
        /// Host file
        host: PathBuf,
    },

    /// Write the content of one entry to stdout
    Get {
        /// Host file
        host: PathBuf,
        /// Entry name
        name: String,
    },

    /// Extract every entry into a directory
    Unpack {
        /// Host file
        host: PathBuf,
        /// Destination directory
        dest: PathBuf,
        /// Remove the destination first
        #[arg(long)]
        clean: bool,
    },

    /// Build a standalone segment file from a directory
    Pack {
        /// Directory holding one file per entry
        root: PathBuf,
        /// Segment file to write
        output: PathBuf,
    },

    /// Replace the segment of a host file with one built from a directory
    Attach {
        /// Host file
        host: PathBuf,
        /// Directory holding one file per entry
        root: PathBuf,
    },

    /// Replace the segment of a host file with a standalone segment file
    AttachSegment {
        /// Host file
        host: PathBuf,
        /// Segment file
        segment: PathBuf,
    },

    /// Remove the segment from a host file
    Strip {
        /// Host file
        host: PathBuf,
    },

    /// Split a segment file into `<file>.index` and `<file>.dat`
    Split {
        /// Segment file
        segment: PathBuf,
    },

    /// Recover a segment from a host file by scanning for its magics
    Recover {
        /// Host file, possibly missing its trailer
        host: PathBuf,
        /// Segment file to write
        output: PathBuf,
    },
}

impl ToolConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse configuration from an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns the clap error for unknown or missing arguments.
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// Replace mode selected by `--in-place`.
    #[must_use]
    pub const fn replace_mode(&self) -> ReplaceMode {
        if self.in_place {
            ReplaceMode::InPlace
        } else {
            ReplaceMode::Atomic
        }
    }
}
