// src/engine/mod.rs

//! Watch-debounce-dispatch engine.
//!
//! This module ties together:
//! - command specs and their resolution against a trigger ([`command`])
//! - the pure phase state machine deciding what to run and when to exit
//!   ([`core`])
//! - the async IO shell that feeds events into the core and hands the
//!   resulting runs to an executor ([`runtime`])

use std::time::Duration;

use crate::exec::RunRecord;
use crate::types::{ChangeBatch, Phase};

/// Identifier of one dispatched command instance, unique per engine run.
pub type RunId = u64;

/// A resolved command ready to be handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub id: RunId,
    pub phase: Phase,
    /// Command name, or the command text when unnamed.
    pub label: String,
    pub command: String,
}

/// Runtime options used by the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Upper bound on how long the end phase may run before the engine exits
    /// anyway.
    pub end_timeout: Duration,
    /// Time a command gets between SIGTERM and SIGKILL when the engine
    /// terminates it.
    pub kill_grace: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            end_timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(3),
        }
    }
}

/// Events flowing into the runtime from the debouncer, executor and signal
/// handlers.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Run the start phase. Only the first request has any effect.
    StartRequested,
    /// A settled batch of filesystem changes.
    Batch(ChangeBatch),
    /// A dispatched command terminated (or could not be spawned).
    RunFinished(RunRecord),
    /// Intentional shutdown (SIGTERM, Ctrl-C). Only the first request runs
    /// the end phase.
    ShutdownRequested,
    /// The end phase took longer than [`RuntimeOptions::end_timeout`].
    EndTimeout,
}

pub mod command;
pub mod core;
pub mod runtime;

pub use command::{CommandPredicate, CommandSource, CommandSpec, Condition, Trigger, resolve};
pub use core::{CoreCommand, CoreStep, EngineCore};
pub use runtime::Runtime;
