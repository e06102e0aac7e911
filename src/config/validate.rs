// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::config::model::{ConfigFile, RawCommand, RawConfigFile, RawIgnoreRule};
use crate::engine::{CommandSpec, Condition};
use crate::errors::{Result, WatchcmdError};
use crate::types::{LiteralMatch, TriggerKind};
use crate::watch::IgnoreSpec;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WatchcmdError;

    /// Validate against the current working directory.
    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let base_dir = std::env::current_dir()?;
        validate_config(raw, &base_dir)
    }
}

/// Validate `raw` and compile it into a [`ConfigFile`].
///
/// `base_dir` is the directory relative paths are resolved against (the
/// config file's directory). Checks:
/// - the watch directory exists and is a directory,
/// - every ignore regex/glob compiles,
/// - every command has a non-empty `cmd`,
/// - every `when` regex/glob compiles,
/// - `start`/`end` conditions only appear in the matching phase.
pub fn validate_config(raw: RawConfigFile, base_dir: &Path) -> Result<ConfigFile> {
    let directory = resolve_directory(raw.directory.as_deref(), base_dir)?;
    let ignore = compile_ignore(
        raw.ignore.map(|i| i.into_rules()).unwrap_or_default(),
        raw.ignore_match,
    )?;

    let commands_on_start =
        compile_commands("commands_on_start", raw.commands_on_start, &directory, &[TriggerKind::End])?;
    let commands_on_change = compile_commands(
        "commands_on_change",
        raw.commands_on_change,
        &directory,
        &[TriggerKind::Start, TriggerKind::End],
    )?;
    let commands_on_end =
        compile_commands("commands_on_end", raw.commands_on_end, &directory, &[TriggerKind::Start])?;

    Ok(ConfigFile {
        directory,
        ignore,
        delay: Duration::from_millis(raw.delay),
        verbosity: raw.verbosity,
        end_timeout: Duration::from_millis(raw.end_timeout),
        commands_on_start,
        commands_on_change,
        commands_on_end,
    })
}

fn resolve_directory(directory: Option<&str>, base_dir: &Path) -> Result<PathBuf> {
    let candidate = match directory.map(str::trim) {
        None | Some("") => base_dir.to_path_buf(),
        Some(dir) => {
            let dir = Path::new(dir);
            if dir.is_absolute() {
                dir.to_path_buf()
            } else {
                base_dir.join(dir)
            }
        }
    };

    let resolved = candidate.canonicalize().map_err(|e| {
        WatchcmdError::ConfigError(format!(
            "watch directory {:?} cannot be resolved: {e}",
            candidate
        ))
    })?;

    if !resolved.is_dir() {
        return Err(WatchcmdError::ConfigError(format!(
            "watch directory {:?} is not a directory",
            resolved
        )));
    }
    Ok(resolved)
}

fn compile_ignore(rules: Vec<RawIgnoreRule>, mode: LiteralMatch) -> Result<IgnoreSpec> {
    let mut specs = Vec::with_capacity(rules.len());
    for rule in rules {
        let spec = match rule {
            RawIgnoreRule::Literal(value) => IgnoreSpec::literal(value, mode),
            RawIgnoreRule::Regex { regex } => IgnoreSpec::Regex(compile_regex("ignore", &regex)?),
            RawIgnoreRule::Glob { glob } => IgnoreSpec::Glob(compile_glob("ignore", &glob)?),
        };
        specs.push(spec);
    }
    Ok(IgnoreSpec::Any(specs))
}

fn compile_commands(
    section: &str,
    raw: Vec<RawCommand>,
    root: &Path,
    foreign_phases: &[TriggerKind],
) -> Result<Vec<CommandSpec>> {
    let mut specs = Vec::with_capacity(raw.len());

    for (idx, cmd) in raw.into_iter().enumerate() {
        let what = match &cmd.name {
            Some(name) => format!("{section}[{idx}] ('{name}')"),
            None => format!("{section}[{idx}]"),
        };

        if cmd.cmd.trim().is_empty() {
            return Err(WatchcmdError::ConfigError(format!("{what}: `cmd` must not be empty")));
        }

        let spec = match cmd.when {
            None => CommandSpec::fixed(cmd.cmd),
            Some(when) => {
                if let Some(kind) = when.events.iter().find(|k| foreign_phases.contains(k)) {
                    return Err(WatchcmdError::ConfigError(format!(
                        "{what}: `when.events` contains \"{kind}\", which never fires in {section}"
                    )));
                }
                let condition = Condition {
                    events: when.events,
                    pattern: when
                        .pattern
                        .as_deref()
                        .map(|p| compile_regex(&what, p))
                        .transpose()?,
                    glob: when.glob.as_deref().map(|g| compile_glob(&what, g)).transpose()?,
                };
                condition.into_command(cmd.cmd, root.to_path_buf())
            }
        };

        specs.push(match cmd.name {
            Some(name) => spec.named(name),
            None => spec,
        });
    }

    Ok(specs)
}

fn compile_regex(what: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| WatchcmdError::ConfigError(format!("{what}: invalid regex {pattern:?}: {e}")))
}

fn compile_glob(what: &str, pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| WatchcmdError::ConfigError(format!("{what}: invalid glob {pattern:?}: {e}")))
}
