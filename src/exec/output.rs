// src/exec/output.rs

//! Where command output goes while it streams.
//!
//! The runner appends every chunk to the run's [`RunRecord`] and also hands
//! it to an [`OutputSink`]. The engine binary uses [`ConsoleSink`], which
//! writes chunks to its own stdout/stderr prefixed with the run's label so
//! interleaved output of concurrent commands stays attributable.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;

use crate::engine::RunId;
use crate::exec::record::{OutputChunk, RunRecord, Stream};

pub trait OutputSink: Send + Sync {
    fn chunk(&self, chunk: &OutputChunk);

    fn run_finished(&self, _record: &RunRecord) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn chunk(&self, _chunk: &OutputChunk) {}
}

/// Writes labelled output to the process's stdout/stderr.
///
/// Colors come from `colored`; whether escape codes are emitted is governed
/// by `colored::control` (set from `--color` at startup).
#[derive(Debug, Default)]
pub struct ConsoleSink {
    /// Whether the next byte written for `(run, stream)` starts a new line.
    at_line_start: Mutex<HashMap<(RunId, Stream), bool>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn prefix(chunk: &OutputChunk) -> String {
        let tag = format!("[{}]", chunk.label);
        match chunk.stream {
            Stream::Stdout => format!("{} ", tag.cyan().bold()),
            Stream::Stderr => format!("{} ", tag.yellow().bold()),
        }
    }
}

impl OutputSink for ConsoleSink {
    fn chunk(&self, chunk: &OutputChunk) {
        let text = chunk.text();
        let prefix = Self::prefix(chunk);

        let mut at_start = match self.at_line_start.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let start = at_start.entry((chunk.run, chunk.stream)).or_insert(true);

        let mut out = String::with_capacity(text.len() + prefix.len());
        for piece in text.split_inclusive('\n') {
            if *start {
                out.push_str(&prefix);
            }
            out.push_str(piece);
            *start = piece.ends_with('\n');
        }
        drop(at_start);

        // Output is best effort; a closed pipe must not take the engine down.
        let _ = match chunk.stream {
            Stream::Stdout => {
                let mut handle = std::io::stdout().lock();
                handle.write_all(out.as_bytes()).and_then(|_| handle.flush())
            }
            Stream::Stderr => {
                let mut handle = std::io::stderr().lock();
                handle.write_all(out.as_bytes()).and_then(|_| handle.flush())
            }
        };
    }

    fn run_finished(&self, record: &RunRecord) {
        let mut at_start = match self.at_line_start.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let unterminated = [Stream::Stdout, Stream::Stderr]
            .into_iter()
            .filter_map(|s| at_start.remove(&(record.id, s)).map(|start| (s, start)))
            .filter(|(_, start)| !start)
            .map(|(s, _)| s)
            .collect::<Vec<_>>();
        drop(at_start);

        for stream in unterminated {
            let _ = match stream {
                Stream::Stdout => writeln!(std::io::stdout()),
                Stream::Stderr => writeln!(std::io::stderr()),
            };
        }
    }
}
