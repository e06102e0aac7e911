// src/watch/ignore.rs

//! Path exclusion rules.
//!
//! An [`IgnoreSpec`] is evaluated for every raw watch event *before* it
//! reaches the debouncer, so excluded paths never occupy a debounce slot.
//! Evaluation is pure: no IO, no state.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use globset::GlobMatcher;
use regex::Regex;
use tracing::debug;

use crate::types::LiteralMatch;

/// Decision function used by [`IgnoreSpec::Predicate`].
///
/// Returning an error is treated as "does not match".
pub type PathPredicate = Arc<dyn Fn(&Path) -> anyhow::Result<bool> + Send + Sync>;

/// A rule (or ordered set of rules) deciding whether a path is excluded.
#[derive(Clone)]
pub enum IgnoreSpec {
    /// Plain string; compared by exact equality or substring.
    Literal { value: String, mode: LiteralMatch },
    Regex(Regex),
    Glob(GlobMatcher),
    Predicate(PathPredicate),
    /// Logical OR over the contained rules, evaluated in order.
    Any(Vec<IgnoreSpec>),
}

impl fmt::Debug for IgnoreSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreSpec::Literal { value, mode } => f
                .debug_struct("Literal")
                .field("value", value)
                .field("mode", mode)
                .finish(),
            IgnoreSpec::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            IgnoreSpec::Glob(glob) => f.debug_tuple("Glob").field(&glob.glob().glob()).finish(),
            IgnoreSpec::Predicate(_) => f.write_str("Predicate(..)"),
            IgnoreSpec::Any(specs) => f.debug_tuple("Any").field(specs).finish(),
        }
    }
}

impl Default for IgnoreSpec {
    /// Matches nothing.
    fn default() -> Self {
        IgnoreSpec::Any(Vec::new())
    }
}

impl IgnoreSpec {
    pub fn literal(value: impl Into<String>, mode: LiteralMatch) -> Self {
        IgnoreSpec::Literal {
            value: value.into(),
            mode,
        }
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        IgnoreSpec::Predicate(Arc::new(f))
    }

    /// Returns true if `path` is excluded by this rule.
    ///
    /// `rel_path` is the same path relative to the watched root, with forward
    /// slashes. Both forms are offered to string/regex/glob rules so configs
    /// can be written either way.
    pub fn matches(&self, path: &Path, rel_path: Option<&str>) -> bool {
        match self {
            IgnoreSpec::Literal { value, mode } => {
                let abs = path.to_string_lossy();
                let hit = |candidate: &str| match mode {
                    LiteralMatch::Exact => candidate == value.as_str(),
                    LiteralMatch::Substring => candidate.contains(value.as_str()),
                };
                hit(abs.as_ref()) || rel_path.is_some_and(hit)
            }
            IgnoreSpec::Regex(re) => {
                re.is_match(&path.to_string_lossy()) || rel_path.is_some_and(|r| re.is_match(r))
            }
            IgnoreSpec::Glob(glob) => {
                glob.is_match(path) || rel_path.is_some_and(|r| glob.is_match(r))
            }
            IgnoreSpec::Predicate(pred) => match pred(path) {
                Ok(hit) => hit,
                Err(err) => {
                    debug!(?path, error = %err, "ignore predicate failed; treating as no match");
                    false
                }
            },
            IgnoreSpec::Any(specs) => specs.iter().any(|s| s.matches(path, rel_path)),
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.matches(path, None)
    }
}

/// Returns true if `path` is excluded by `spec`.
///
/// Convenience form of [`IgnoreSpec::matches`] without a root-relative path.
pub fn is_ignored(path: &Path, spec: &IgnoreSpec) -> bool {
    spec.is_ignored(path)
}
