// src/logging.rs

//! Logging setup for `watchcmd` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `WATCHCMD_LOG` environment variable (an `EnvFilter` directive such as
//!    "info" or "watchcmd::exec=debug")
//! 3. the configuration's `verbosity`
//!
//! Logs are sent to STDERR so that stdout carries command output only.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;
use crate::types::Verbosity;

/// Environment variable consulted when no `--log-level` flag is given.
pub const LOG_ENV_VAR: &str = "WATCHCMD_LOG";

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; a second call fails because a global
/// subscriber is already installed.
pub fn init_logging(cli_level: Option<LogLevel>, verbosity: Verbosity, color: bool) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok(), verbosity);

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

/// Decide the filter from the three sources, highest priority first.
pub fn build_filter(
    cli_level: Option<LogLevel>,
    env_value: Option<String>,
    verbosity: Verbosity,
) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(level_from_log_level(lvl).as_str().to_lowercase());
    }

    if let Some(directive) = env_value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        match EnvFilter::try_new(&directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("watchcmd: ignoring invalid {LOG_ENV_VAR}={directive:?}: {err}"),
        }
    }

    EnvFilter::new(level_from_verbosity(verbosity).as_str().to_lowercase())
}

pub fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn level_from_verbosity(verbosity: Verbosity) -> Level {
    match verbosity {
        Verbosity::Minimal => Level::WARN,
        Verbosity::Normal => Level::INFO,
        Verbosity::Verbose => Level::DEBUG,
    }
}
