// src/engine/command.rs

//! Command specifications and their resolution.
//!
//! A [`CommandSpec`] is either a fixed shell string or a decision function
//! `(TriggerKind, path) -> Option<String>`. Both shapes go through
//! [`resolve`], which never fails: a decision function that errors is logged
//! at debug level and treated as "skip".

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobMatcher;
use regex::Regex;
use tracing::debug;

use crate::types::{TriggerKind, WatchEvent};
use crate::watch::path_utils::relative_str;

/// Decision function behind a conditional command.
///
/// `Ok(None)` (or an empty string) means "do not run this time".
pub type CommandPredicate =
    Arc<dyn Fn(TriggerKind, &Path) -> anyhow::Result<Option<String>> + Send + Sync>;

#[derive(Clone)]
pub enum CommandSource {
    /// Runs unconditionally.
    Fixed(String),
    /// Evaluated per trigger.
    Conditional(CommandPredicate),
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Fixed(cmd) => f.debug_tuple("Fixed").field(cmd).finish(),
            CommandSource::Conditional(_) => f.write_str("Conditional(..)"),
        }
    }
}

/// One configured unit of work.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: Option<String>,
    pub source: CommandSource,
}

impl CommandSpec {
    pub fn fixed(cmd: impl Into<String>) -> Self {
        Self {
            name: None,
            source: CommandSource::Fixed(cmd.into()),
        }
    }

    pub fn conditional<F>(f: F) -> Self
    where
        F: Fn(TriggerKind, &Path) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        Self {
            name: None,
            source: CommandSource::Conditional(Arc::new(f)),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label used to attribute output: the name if set, otherwise `fallback`
    /// (normally the resolved command text).
    pub fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }
}

/// What a command is resolved against.
#[derive(Debug, Clone, Copy)]
pub struct Trigger<'a> {
    pub kind: TriggerKind,
    pub path: &'a Path,
}

impl<'a> Trigger<'a> {
    /// Phase sentinel for startup; `root` is the project directory.
    pub fn start(root: &'a Path) -> Self {
        Self {
            kind: TriggerKind::Start,
            path: root,
        }
    }

    /// Phase sentinel for shutdown; `root` is the project directory.
    pub fn end(root: &'a Path) -> Self {
        Self {
            kind: TriggerKind::End,
            path: root,
        }
    }

    pub fn event(event: &'a WatchEvent) -> Self {
        Self {
            kind: event.kind.into(),
            path: &event.path,
        }
    }
}

/// Resolve `spec` for `trigger` into a runnable command string.
///
/// Returns `None` when the command should be skipped this time.
pub fn resolve(spec: &CommandSpec, trigger: Trigger<'_>) -> Option<String> {
    let resolved = match &spec.source {
        CommandSource::Fixed(cmd) => Some(cmd.clone()),
        CommandSource::Conditional(predicate) => match predicate(trigger.kind, trigger.path) {
            Ok(out) => out,
            Err(err) => {
                debug!(
                    command = spec.name.as_deref().unwrap_or("<conditional>"),
                    trigger = %trigger.kind,
                    path = ?trigger.path,
                    error = %err,
                    "command predicate failed; skipping"
                );
                None
            }
        },
    };

    match resolved {
        Some(cmd) if !cmd.trim().is_empty() => Some(cmd),
        _ => {
            debug!(
                command = spec.name.as_deref().unwrap_or("<conditional>"),
                trigger = %trigger.kind,
                path = ?trigger.path,
                "command resolved to nothing; skipping"
            );
            None
        }
    }
}

/// Declarative condition for a command, as written in the config file.
///
/// - `events`: trigger kinds that may run the command. Empty means any file
///   event (add/change/unlink); `start`/`end` must be listed explicitly.
/// - `pattern`: regex matched against the root-relative path (and the
///   absolute path as a fallback).
/// - `glob`: glob matched against the root-relative path.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub events: Vec<TriggerKind>,
    pub pattern: Option<Regex>,
    pub glob: Option<GlobMatcher>,
}

impl Condition {
    pub fn accepts(&self, kind: TriggerKind, rel: &str, abs: &Path) -> bool {
        let kind_ok = if self.events.is_empty() {
            !matches!(kind, TriggerKind::Start | TriggerKind::End)
        } else {
            self.events.contains(&kind)
        };
        if !kind_ok {
            return false;
        }

        if let Some(re) = &self.pattern {
            if !re.is_match(rel) && !re.is_match(&abs.to_string_lossy()) {
                return false;
            }
        }
        if let Some(glob) = &self.glob {
            if !glob.is_match(rel) {
                return false;
            }
        }
        true
    }

    /// Turn the condition plus a `{event}`/`{path}`/`{abspath}` template into
    /// a conditional [`CommandSpec`].
    pub fn into_command(self, template: String, root: PathBuf) -> CommandSpec {
        CommandSpec::conditional(move |kind, path| {
            let rel = match relative_str(&root, path) {
                Some(rel) if rel.is_empty() => ".".to_string(),
                Some(rel) => rel,
                None => path.to_string_lossy().into_owned(),
            };
            if !self.accepts(kind, &rel, path) {
                return Ok(None);
            }
            Ok(Some(render_template(&template, kind, &rel, path)))
        })
    }
}

/// Substitute `{event}`, `{path}` (root-relative) and `{abspath}`.
pub fn render_template(template: &str, kind: TriggerKind, rel: &str, abs: &Path) -> String {
    template
        .replace("{event}", kind.as_str())
        .replace("{abspath}", &abs.to_string_lossy())
        .replace("{path}", rel)
}
