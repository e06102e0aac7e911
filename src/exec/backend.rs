// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning processes
//! itself, so tests can swap in a fake executor that records dispatches and
//! reports completion immediately.
//!
//! - [`RealExecutorBackend`] spawns one Tokio task per dispatched command
//!   (see [`run_command`]) and reports each closed [`RunRecord`] back to the
//!   runtime as [`EngineEvent::RunFinished`].
//! - Commands run concurrently; the backend imposes no ordering or mutual
//!   exclusion beyond initiating them in the order given.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{Dispatch, EngineEvent, RunId};
use crate::errors::Result;
use crate::exec::output::OutputSink;
use crate::exec::runner::run_command;

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how dispatched commands are executed.
pub trait ExecutorBackend: Send {
    /// Start the given runs, in order. Must not wait for them to finish.
    fn dispatch(&mut self, runs: Vec<Dispatch>) -> BackendFuture<'_>;

    /// Terminate every run that is still going (SIGTERM, then SIGKILL after
    /// `grace`) and wait for their records to close.
    fn shutdown(&mut self, grace: Duration) -> BackendFuture<'_>;
}

/// Internal handle for a currently-running command.
struct ActiveRun {
    cancel: Option<oneshot::Sender<Duration>>,
    handle: JoinHandle<()>,
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    cwd: PathBuf,
    sink: Arc<dyn OutputSink>,
    runtime_tx: mpsc::Sender<EngineEvent>,
    active: HashMap<RunId, ActiveRun>,
}

impl RealExecutorBackend {
    /// `cwd` is the project root every command runs in.
    pub fn new(
        cwd: impl Into<PathBuf>,
        sink: Arc<dyn OutputSink>,
        runtime_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            sink,
            runtime_tx,
            active: HashMap::new(),
        }
    }

    /// Number of runs whose task has not finished yet.
    pub fn active_count(&self) -> usize {
        self.active
            .values()
            .filter(|run| !run.handle.is_finished())
            .count()
    }

    fn start(&mut self, dispatch: Dispatch) {
        self.active.retain(|_, run| !run.handle.is_finished());

        let (cancel_tx, cancel_rx) = oneshot::channel::<Duration>();
        let cwd = self.cwd.clone();
        let sink = Arc::clone(&self.sink);
        let tx = self.runtime_tx.clone();
        let id = dispatch.id;

        let handle = tokio::spawn(async move {
            let record = run_command(dispatch, &cwd, sink, cancel_rx).await;
            if tx.send(EngineEvent::RunFinished(record)).await.is_err() {
                debug!(run = id, "runtime gone; dropping run record");
            }
        });

        self.active.insert(
            id,
            ActiveRun {
                cancel: Some(cancel_tx),
                handle,
            },
        );
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn dispatch(&mut self, runs: Vec<Dispatch>) -> BackendFuture<'_> {
        for run in runs {
            self.start(run);
        }
        Box::pin(async { Ok(()) })
    }

    fn shutdown(&mut self, grace: Duration) -> BackendFuture<'_> {
        let active: Vec<(RunId, ActiveRun)> = self.active.drain().collect();

        Box::pin(async move {
            let mut handles = Vec::with_capacity(active.len());
            for (id, mut run) in active {
                if run.handle.is_finished() {
                    continue;
                }
                info!(run = id, "terminating running command");
                if let Some(cancel) = run.cancel.take() {
                    if cancel.send(grace).is_err() {
                        debug!(run = id, "command already finished while cancelling");
                    }
                }
                handles.push(run.handle);
            }

            for handle in handles {
                // A panicked runner has nothing left to clean up.
                let _ = handle.await;
            }
            Ok(())
        })
    }
}
