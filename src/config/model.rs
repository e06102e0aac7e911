// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::CommandSpec;
use crate::types::{LiteralMatch, TriggerKind, Verbosity};
use crate::watch::IgnoreSpec;

/// Default debounce delay in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 1000;
/// Default time the end phase may take, in milliseconds.
pub const DEFAULT_END_TIMEOUT_MS: u64 = 10_000;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// directory = "."
/// delay = 1000
/// verbosity = "normal"
/// ignore = ["node_modules", { regex = "\\.git" }]
///
/// [[commands_on_start]]
/// name = "sass"
/// cmd = "sass --watch css"
///
/// [[commands_on_change]]
/// name = "upload html"
/// cmd = "ncftpput -u user -p pass ftp.server.com /srv/http \"{path}\""
/// when = { events = ["change"], pattern = "\\.html$" }
/// ```
///
/// Every key is optional. The camelCase spellings (`commandsOnStart`, ...)
/// are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Directory to watch, relative to the config file. Empty or missing means
    /// the config file's own directory.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default)]
    pub ignore: Option<RawIgnore>,

    /// How plain-string ignore rules compare against paths.
    #[serde(default, alias = "ignoreMatch")]
    pub ignore_match: LiteralMatch,

    /// Debounce delay in milliseconds; 0 disables debouncing.
    #[serde(default = "default_delay")]
    pub delay: u64,

    #[serde(default)]
    pub verbosity: Verbosity,

    /// Milliseconds the end phase may take before remaining commands are
    /// terminated.
    #[serde(default = "default_end_timeout", alias = "endTimeout")]
    pub end_timeout: u64,

    #[serde(default, alias = "commandsOnStart")]
    pub commands_on_start: Vec<RawCommand>,

    #[serde(default, alias = "commandsOnChange")]
    pub commands_on_change: Vec<RawCommand>,

    #[serde(default, alias = "commandsOnEnd")]
    pub commands_on_end: Vec<RawCommand>,
}

fn default_delay() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_end_timeout() -> u64 {
    DEFAULT_END_TIMEOUT_MS
}

/// `ignore` accepts a single rule or a list of rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawIgnore {
    One(RawIgnoreRule),
    Many(Vec<RawIgnoreRule>),
}

impl RawIgnore {
    pub fn into_rules(self) -> Vec<RawIgnoreRule> {
        match self {
            RawIgnore::One(rule) => vec![rule],
            RawIgnore::Many(rules) => rules,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawIgnoreRule {
    Literal(String),
    Regex { regex: String },
    Glob { glob: String },
}

/// One entry of `commands_on_start` / `commands_on_change` / `commands_on_end`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCommand {
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command. With `when`, `{event}`, `{path}` and `{abspath}` are
    /// substituted before running.
    #[serde(alias = "command")]
    pub cmd: String,

    /// Optional condition; without it the command always runs.
    #[serde(default)]
    pub when: Option<RawCondition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCondition {
    #[serde(default)]
    pub events: Vec<TriggerKind>,

    /// Regex matched against the changed path.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Glob matched against the root-relative changed path.
    #[serde(default)]
    pub glob: Option<String>,
}

/// Validated configuration, immutable for the lifetime of an engine run.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Absolute project root: watched recursively and used as the working
    /// directory of every command.
    pub directory: PathBuf,
    pub ignore: IgnoreSpec,
    pub delay: Duration,
    pub verbosity: Verbosity,
    pub end_timeout: Duration,
    pub commands_on_start: Vec<CommandSpec>,
    pub commands_on_change: Vec<CommandSpec>,
    pub commands_on_end: Vec<CommandSpec>,
}

impl ConfigFile {
    /// A configuration for `directory` with defaults and no commands.
    pub fn empty(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ignore: IgnoreSpec::default(),
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            verbosity: Verbosity::default(),
            end_timeout: Duration::from_millis(DEFAULT_END_TIMEOUT_MS),
            commands_on_start: Vec::new(),
            commands_on_change: Vec::new(),
            commands_on_end: Vec::new(),
        }
    }
}
