// src/exec/record.rs

use std::fmt;
use std::time::SystemTime;

use crate::engine::{Dispatch, RunId};
use crate::types::Phase;

/// Exit code recorded for a command terminated by the engine.
pub const KILLED_EXIT_CODE: i32 = -9;
/// Exit code recorded for a command whose shell could not be launched.
pub const SPAWN_FAILED_EXIT_CODE: i32 = -1;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited by itself. Signal deaths without a code are `-1`.
    Exited(i32),
    /// Terminated by the engine (shutdown or cancellation).
    Killed,
    /// The shell could not be spawned.
    SpawnFailed(String),
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Exited(code) => *code,
            RunStatus::Killed => KILLED_EXIT_CODE,
            RunStatus::SpawnFailed(_) => SPAWN_FAILED_EXIT_CODE,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// A piece of output as read from a child pipe, attributed to its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub run: RunId,
    pub phase: Phase,
    pub label: String,
    pub stream: Stream,
    pub data: Vec<u8>,
}

impl OutputChunk {
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Tracked execution of one dispatched command instance.
///
/// Output is append-only and written only by the runner task that owns the
/// process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: RunId,
    pub phase: Phase,
    pub label: String,
    pub command: String,
    pub started_at: SystemTime,
    pub finished_at: Option<SystemTime>,
    pub status: Option<RunStatus>,
    pub output: Vec<OutputChunk>,
}

impl RunRecord {
    pub fn open(dispatch: &Dispatch) -> Self {
        Self {
            id: dispatch.id,
            phase: dispatch.phase,
            label: dispatch.label.clone(),
            command: dispatch.command.clone(),
            started_at: SystemTime::now(),
            finished_at: None,
            status: None,
            output: Vec::new(),
        }
    }

    pub fn chunk(&self, stream: Stream, data: Vec<u8>) -> OutputChunk {
        OutputChunk {
            run: self.id,
            phase: self.phase,
            label: self.label.clone(),
            stream,
            data,
        }
    }

    pub fn close(&mut self, status: RunStatus) {
        self.status = Some(status);
        self.finished_at = Some(SystemTime::now());
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_some()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.as_ref().map(RunStatus::exit_code)
    }

    /// All output of `stream` concatenated, lossily decoded.
    pub fn output_text(&self, stream: Stream) -> String {
        let bytes: Vec<u8> = self
            .output
            .iter()
            .filter(|c| c.stream == stream)
            .flat_map(|c| c.data.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
