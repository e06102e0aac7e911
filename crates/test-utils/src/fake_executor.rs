use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use watchcmd::engine::{Dispatch, EngineEvent};
use watchcmd::exec::{BackendFuture, ExecutorBackend, RunRecord, RunStatus};
use watchcmd::types::Phase;

/// Everything the fake executor saw, shared with the test.
#[derive(Debug, Default)]
pub struct Recorded {
    pub dispatched: Vec<Dispatch>,
    pub shutdowns: usize,
}

impl Recorded {
    pub fn commands(&self) -> Vec<String> {
        self.dispatched.iter().map(|d| d.command.clone()).collect()
    }

    pub fn commands_in(&self, phase: Phase) -> Vec<String> {
        self.dispatched
            .iter()
            .filter(|d| d.phase == phase)
            .map(|d| d.command.clone())
            .collect()
    }
}

/// A fake executor that:
/// - records every dispatched run
/// - immediately reports `RunFinished` with exit code 0, except for phases
///   marked as held (those runs never finish on their own).
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<EngineEvent>,
    recorded: Arc<Mutex<Recorded>>,
    held: HashSet<Phase>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<EngineEvent>, recorded: Arc<Mutex<Recorded>>) -> Self {
        Self {
            runtime_tx,
            recorded,
            held: HashSet::new(),
        }
    }

    /// Runs of `phase` are recorded but never reported as finished.
    pub fn hold(mut self, phase: Phase) -> Self {
        self.held.insert(phase);
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(&mut self, runs: Vec<Dispatch>) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let recorded = Arc::clone(&self.recorded);
        let held = self.held.clone();

        Box::pin(async move {
            for run in runs {
                recorded.lock().unwrap().dispatched.push(run.clone());
                if held.contains(&run.phase) {
                    continue;
                }

                let mut record = RunRecord::open(&run);
                record.close(RunStatus::Exited(0));
                // Sent from a separate task: the runtime is the only
                // consumer and is busy awaiting this future.
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(EngineEvent::RunFinished(record)).await;
                });
            }
            Ok(())
        })
    }

    fn shutdown(&mut self, _grace: Duration) -> BackendFuture<'_> {
        self.recorded.lock().unwrap().shutdowns += 1;
        Box::pin(async { Ok(()) })
    }
}
