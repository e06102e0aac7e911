// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for the `watchcmd` engine.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchcmd",
    version,
    about = "Watch a directory and run shell commands on start, change and shutdown.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(value_name = "CONFIG", default_value = crate::config::DEFAULT_CONFIG_FILE_NAME)]
    pub config: String,

    /// Emit ANSI colors on stdout/stderr even when not attached to a
    /// terminal. The supervisor always passes this.
    #[arg(long)]
    pub color: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHCMD_LOG` or the config's `verbosity` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved configuration, but don't watch
    /// or run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
