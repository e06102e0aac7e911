#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use watchcmd::config::ConfigFile;
use watchcmd::engine::{CommandSpec, Condition, EngineCore};
use watchcmd::types::{LiteralMatch, TriggerKind};
use watchcmd::watch::IgnoreSpec;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Builds the validated model directly, so no directory needs to exist.
pub struct ConfigFileBuilder {
    config: ConfigFile,
    ignore: Vec<IgnoreSpec>,
}

impl ConfigFileBuilder {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            config: ConfigFile::empty(directory),
            ignore: Vec::new(),
        }
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.config.delay = Duration::from_millis(ms);
        self
    }

    pub fn end_timeout_ms(mut self, ms: u64) -> Self {
        self.config.end_timeout = Duration::from_millis(ms);
        self
    }

    pub fn ignore(mut self, spec: IgnoreSpec) -> Self {
        self.ignore.push(spec);
        self
    }

    pub fn ignore_literal(self, value: &str) -> Self {
        self.ignore(IgnoreSpec::literal(value, LiteralMatch::Substring))
    }

    pub fn on_start(mut self, spec: CommandSpec) -> Self {
        self.config.commands_on_start.push(spec);
        self
    }

    pub fn on_change(mut self, spec: CommandSpec) -> Self {
        self.config.commands_on_change.push(spec);
        self
    }

    pub fn on_end(mut self, spec: CommandSpec) -> Self {
        self.config.commands_on_end.push(spec);
        self
    }

    pub fn build(mut self) -> ConfigFile {
        self.config.ignore = IgnoreSpec::Any(self.ignore);
        self.config
    }

    pub fn core(self) -> EngineCore {
        EngineCore::from_config(&self.build())
    }
}

/// Conditional command running `cmd` for file events whose path ends with
/// `suffix`.
pub fn on_suffix(cmd: &str, suffix: &str) -> CommandSpec {
    let cmd = cmd.to_string();
    let suffix = suffix.to_string();
    CommandSpec::conditional(move |kind, path: &Path| {
        let is_file_event = matches!(
            kind,
            TriggerKind::Add | TriggerKind::Change | TriggerKind::Unlink
        );
        let hit = path.to_string_lossy().ends_with(suffix.as_str());
        Ok((is_file_event && hit).then(|| cmd.clone()))
    })
}

/// Conditional command built the way a `when = { ... }` table is compiled.
pub fn when(
    template: &str,
    events: &[TriggerKind],
    pattern: Option<&str>,
    root: impl Into<PathBuf>,
) -> CommandSpec {
    let condition = Condition {
        events: events.to_vec(),
        pattern: pattern.map(|p| regex::Regex::new(p).expect("valid test regex")),
        glob: None,
    };
    condition.into_command(template.to_string(), root.into())
}
