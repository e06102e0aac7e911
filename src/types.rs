use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// How chatty the engine is when no explicit log level is given.
///
/// - `Minimal`: warnings and errors only.
/// - `Normal`: lifecycle messages and command starts/exits (default).
/// - `Verbose`: everything, including skipped commands and ignored paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Minimal,
    Normal,
    Verbose,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Normal
    }
}

/// Semantics for plain-string ignore rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralMatch {
    /// The whole path (absolute or root-relative) must equal the string.
    Exact,
    /// The string may appear anywhere in the path.
    Substring,
}

impl Default for LiteralMatch {
    fn default() -> Self {
        LiteralMatch::Substring
    }
}

/// Kind of a filesystem change as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Add,
    Change,
    Unlink,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Change => "change",
            EventKind::Unlink => "unlink",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw change reported by the directory watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn add(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Add, path)
    }

    pub fn change(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Change, path)
    }

    pub fn unlink(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Unlink, path)
    }
}

/// Settled events flushed by the debouncer at one instant.
///
/// At most one entry per path, so `(path, kind)` is unique within a batch.
/// Entries are ordered by path to keep dispatch deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    events: BTreeMap<PathBuf, EventKind>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event, replacing any earlier kind recorded for the same path.
    pub fn insert(&mut self, event: WatchEvent) {
        self.events.insert(event.path, event.kind);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.events.contains_key(path)
    }

    pub fn events(&self) -> impl Iterator<Item = WatchEvent> + '_ {
        self.events
            .iter()
            .map(|(path, kind)| WatchEvent::new(*kind, path.clone()))
    }
}

impl FromIterator<WatchEvent> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = WatchEvent>>(iter: I) -> Self {
        let mut batch = ChangeBatch::new();
        for event in iter {
            batch.insert(event);
        }
        batch
    }
}

/// Lifecycle phase a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    Change,
    End,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Change => "change",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a conditional command is being asked about.
///
/// `Start` and `End` are phase sentinels used when there is no triggering
/// filesystem event; the other variants mirror [`EventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Start,
    Add,
    Change,
    Unlink,
    End,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Start => "start",
            TriggerKind::Add => "add",
            TriggerKind::Change => "change",
            TriggerKind::Unlink => "unlink",
            TriggerKind::End => "end",
        }
    }
}

impl From<EventKind> for TriggerKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Add => TriggerKind::Add,
            EventKind::Change => TriggerKind::Change,
            EventKind::Unlink => TriggerKind::Unlink,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
