// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running resolved commands, using
//! `tokio::process::Command`, and reporting back to the engine runtime via
//! `EngineEvent`s.
//!
//! - [`runner`] runs a single command and produces its [`RunRecord`].
//! - [`record`] holds the run record, output chunk and status types.
//! - [`output`] is where streaming output goes (console in the engine).
//! - [`terminate`] holds shell construction and process-group termination,
//!   shared with the supervisor.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend`, which tests can replace with a fake.

pub mod backend;
pub mod output;
pub mod record;
pub mod runner;
pub mod terminate;

pub use backend::{BackendFuture, ExecutorBackend, RealExecutorBackend};
pub use output::{ConsoleSink, NullSink, OutputSink};
pub use record::{
    KILLED_EXIT_CODE, OutputChunk, RunRecord, RunStatus, SPAWN_FAILED_EXIT_CODE, Stream,
};
pub use runner::run_command;
