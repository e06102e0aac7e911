// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`) and translating
//!   its events into add/change/unlink [`WatchEvent`](crate::types::WatchEvent)s.
//! - Dropping paths excluded by the configured [`IgnoreSpec`].
//! - Debouncing the surviving events into settled change batches.
//!
//! It does **not** know about commands; it only turns filesystem activity
//! into [`EngineEvent::Batch`](crate::engine::EngineEvent::Batch) values.

pub mod debounce;
pub mod ignore;
pub mod path_utils;
pub mod watcher;

pub use debounce::{Debouncer, DebouncerHandle, spawn_debouncer};
pub use ignore::{IgnoreSpec, PathPredicate, is_ignored};
pub use watcher::{WatcherHandle, classify, should_forward, spawn_watcher};
