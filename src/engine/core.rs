// src/engine/core.rs

//! Pure engine state machine.
//!
//! [`EngineCore`] consumes [`EngineEvent`]s and produces [`CoreCommand`]s for
//! the IO shell (`engine::runtime::Runtime`). It owns no channels, timers or
//! processes, so the phase rules can be tested without Tokio:
//!
//! - the start phase runs once, on the first `StartRequested`;
//! - each change batch resolves every change command against every event in
//!   the batch, in configuration order, running each distinct command text at
//!   most once per batch;
//! - the end phase runs once, on the first `ShutdownRequested`, after which
//!   further batches are ignored and the engine exits when the end commands
//!   have finished (or timed out).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::engine::command::{CommandSpec, Trigger, resolve};
use crate::engine::{Dispatch, EngineEvent, RunId};
use crate::exec::{RunRecord, RunStatus};
use crate::types::{ChangeBatch, Phase};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Hand these runs to the executor, in order.
    Dispatch(Vec<Dispatch>),
    /// Stop the watcher and debouncer; no more batches are wanted.
    StopWatching,
    /// Arm the end-phase timeout.
    StartEndTimer,
    /// Terminate remaining commands and leave the runtime loop.
    Exit,
}

/// Decision returned by the core after handling a single `EngineEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn idle() -> Self {
        Self::running(Vec::new())
    }

    fn exit(mut commands: Vec<CoreCommand>) -> Self {
        commands.push(CoreCommand::Exit);
        Self {
            commands,
            keep_running: false,
        }
    }
}

#[derive(Debug)]
pub struct EngineCore {
    root: PathBuf,
    on_start: Vec<CommandSpec>,
    on_change: Vec<CommandSpec>,
    on_end: Vec<CommandSpec>,
    next_id: RunId,
    started: bool,
    ending: bool,
    running: HashSet<RunId>,
    pending_end: HashSet<RunId>,
    end_phase_runs: usize,
}

impl EngineCore {
    pub fn new(
        root: impl Into<PathBuf>,
        on_start: Vec<CommandSpec>,
        on_change: Vec<CommandSpec>,
        on_end: Vec<CommandSpec>,
    ) -> Self {
        Self {
            root: root.into(),
            on_start,
            on_change,
            on_end,
            next_id: 1,
            started: false,
            ending: false,
            running: HashSet::new(),
            pending_end: HashSet::new(),
            end_phase_runs: 0,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            cfg.directory.clone(),
            cfg.commands_on_start.clone(),
            cfg.commands_on_change.clone(),
            cfg.commands_on_end.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True once shutdown has begun.
    pub fn is_ending(&self) -> bool {
        self.ending
    }

    /// Number of dispatched runs that have not reported back yet.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// How many times the end phase has been entered (0 or 1).
    pub fn end_phase_runs(&self) -> usize {
        self.end_phase_runs
    }

    /// Handle a single engine event, updating state and returning the
    /// commands for the IO shell.
    pub fn step(&mut self, event: EngineEvent) -> CoreStep {
        match event {
            EngineEvent::StartRequested => self.handle_start(),
            EngineEvent::Batch(batch) => self.handle_batch(batch),
            EngineEvent::RunFinished(record) => self.handle_run_finished(&record),
            EngineEvent::ShutdownRequested => self.handle_shutdown(),
            EngineEvent::EndTimeout => self.handle_end_timeout(),
        }
    }

    fn handle_start(&mut self) -> CoreStep {
        if self.started || self.ending {
            debug!("start phase already handled; ignoring");
            return CoreStep::idle();
        }
        self.started = true;

        let root = self.root.clone();
        let runs: Vec<Dispatch> = self
            .on_start
            .clone()
            .iter()
            .filter_map(|spec| {
                let cmd = resolve(spec, Trigger::start(&root))?;
                Some(self.make_dispatch(Phase::Start, spec, cmd))
            })
            .collect();

        info!(commands = runs.len(), "running start phase");
        CoreStep::running(dispatch_if_any(runs))
    }

    fn handle_batch(&mut self, batch: ChangeBatch) -> CoreStep {
        if self.ending {
            debug!(paths = batch.len(), "shutdown in progress; ignoring change batch");
            return CoreStep::idle();
        }

        let specs = self.on_change.clone();
        let mut seen: HashSet<String> = HashSet::new();
        let mut runs = Vec::new();

        // Initiation follows configuration order; a command runs at most once
        // per batch no matter how many paths select it.
        for spec in &specs {
            for event in batch.events() {
                let Some(cmd) = resolve(spec, Trigger::event(&event)) else {
                    continue;
                };
                if !seen.insert(cmd.clone()) {
                    debug!(command = %cmd, "command already dispatched for this batch");
                    continue;
                }
                runs.push(self.make_dispatch(Phase::Change, spec, cmd));
            }
        }

        if runs.is_empty() {
            debug!(paths = batch.len(), "no change commands matched batch");
        } else {
            info!(paths = batch.len(), commands = runs.len(), "running change phase");
        }
        CoreStep::running(dispatch_if_any(runs))
    }

    fn handle_run_finished(&mut self, record: &RunRecord) -> CoreStep {
        self.running.remove(&record.id);

        match &record.status {
            Some(RunStatus::Exited(0)) => {
                info!(phase = %record.phase, label = %record.label, "command finished");
            }
            Some(RunStatus::Exited(code)) => {
                warn!(phase = %record.phase, label = %record.label, exit_code = code, "command failed");
            }
            Some(RunStatus::Killed) => {
                info!(phase = %record.phase, label = %record.label, "command killed");
            }
            Some(RunStatus::SpawnFailed(reason)) => {
                warn!(phase = %record.phase, label = %record.label, %reason, "command could not be started");
            }
            None => {
                debug!(phase = %record.phase, label = %record.label, "run reported without status");
            }
        }

        if self.ending && self.pending_end.remove(&record.id) && self.pending_end.is_empty() {
            info!("end phase finished");
            return CoreStep::exit(Vec::new());
        }
        CoreStep::idle()
    }

    fn handle_shutdown(&mut self) -> CoreStep {
        if self.ending {
            debug!("shutdown already in progress; ignoring repeated request");
            return CoreStep::idle();
        }
        self.ending = true;
        self.end_phase_runs += 1;

        let root = self.root.clone();
        let runs: Vec<Dispatch> = self
            .on_end
            .clone()
            .iter()
            .filter_map(|spec| {
                let cmd = resolve(spec, Trigger::end(&root))?;
                Some(self.make_dispatch(Phase::End, spec, cmd))
            })
            .collect();

        let mut commands = vec![CoreCommand::StopWatching];
        if runs.is_empty() {
            info!("shutdown requested; no end commands to run");
            return CoreStep::exit(commands);
        }

        info!(commands = runs.len(), "shutdown requested; running end phase");
        self.pending_end = runs.iter().map(|d| d.id).collect();
        commands.push(CoreCommand::Dispatch(runs));
        commands.push(CoreCommand::StartEndTimer);
        CoreStep::running(commands)
    }

    fn handle_end_timeout(&mut self) -> CoreStep {
        if !self.ending || self.pending_end.is_empty() {
            return CoreStep::idle();
        }
        warn!(
            remaining = self.pending_end.len(),
            "end phase timed out; terminating remaining commands"
        );
        self.pending_end.clear();
        CoreStep::exit(Vec::new())
    }

    fn make_dispatch(&mut self, phase: Phase, spec: &CommandSpec, command: String) -> Dispatch {
        let id = self.next_id;
        self.next_id += 1;
        self.running.insert(id);
        Dispatch {
            id,
            phase,
            label: spec.label_or(&command).to_string(),
            command,
        }
    }
}

fn dispatch_if_any(runs: Vec<Dispatch>) -> Vec<CoreCommand> {
    if runs.is_empty() {
        Vec::new()
    } else {
        vec![CoreCommand::Dispatch(runs)]
    }
}
