// src/watch/debounce.rs

//! Coalescing of rapid filesystem events.
//!
//! Every event (re)starts a timer of length `delay` keyed by its path. When a
//! path's timer expires without a newer event for that path, the latest event
//! for it is flushed into the batch that is dispatched at that instant. Editor
//! autosaves and build tools rewriting a file several times in a row therefore
//! produce a single change per path.
//!
//! [`Debouncer`] is the pure timer table (time is passed in); the async driver
//! [`spawn_debouncer`] runs it on the Tokio event loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use crate::engine::EngineEvent;
use crate::types::{ChangeBatch, EventKind, WatchEvent};

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: EventKind,
    deadline: Instant,
}

/// Per-path debounce timer table.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// A zero delay disables batching entirely.
    pub fn is_passthrough(&self) -> bool {
        self.delay.is_zero()
    }

    /// Register an event observed at `now`.
    ///
    /// In passthrough mode the event is returned immediately as a batch of
    /// one. Otherwise the path's timer is reset and its kind replaced by the
    /// latest one; nothing is returned until [`flush_ready`](Self::flush_ready).
    pub fn register(&mut self, event: WatchEvent, now: Instant) -> Option<ChangeBatch> {
        if self.is_passthrough() {
            return Some(std::iter::once(event).collect());
        }

        let deadline = now + self.delay;
        match self.pending.get_mut(&event.path) {
            Some(pending) => {
                trace!(path = ?event.path, from = %pending.kind, to = %event.kind, "debounce timer reset");
                pending.kind = event.kind;
                pending.deadline = deadline;
            }
            None => {
                self.pending.insert(
                    event.path,
                    Pending {
                        kind: event.kind,
                        deadline,
                    },
                );
            }
        }
        None
    }

    /// Remove and return every path whose timer has expired at `now`.
    pub fn flush_ready(&mut self, now: Instant) -> ChangeBatch {
        let mut batch = ChangeBatch::new();
        self.pending.retain(|path, pending| {
            if pending.deadline <= now {
                batch.insert(WatchEvent::new(pending.kind, path.clone()));
                false
            } else {
                true
            }
        });
        batch
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending timer without emitting anything.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Handle for the debouncer task. Dropping it cancels all pending timers.
#[derive(Debug)]
pub struct DebouncerHandle {
    task: JoinHandle<()>,
}

impl DebouncerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DebouncerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the async debouncer.
///
/// Consumes already-filtered events from `raw_rx` and forwards settled
/// batches to the engine as [`EngineEvent::Batch`]. The task ends when
/// `raw_rx` closes or the engine channel is gone; pending timers are
/// discarded in both cases.
pub fn spawn_debouncer(
    delay: Duration,
    mut raw_rx: mpsc::Receiver<WatchEvent>,
    engine_tx: mpsc::Sender<EngineEvent>,
) -> DebouncerHandle {
    let task = tokio::spawn(async move {
        let mut debouncer = Debouncer::new(delay);
        debug!(?delay, "debouncer started");

        loop {
            let deadline = debouncer.next_deadline();

            let batch = tokio::select! {
                maybe = raw_rx.recv() => match maybe {
                    Some(event) => debouncer.register(event, Instant::now()),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Some(debouncer.flush_ready(Instant::now()))
                }
            };

            let Some(batch) = batch else { continue };
            if batch.is_empty() {
                continue;
            }

            debug!(paths = batch.len(), "debounce window settled; dispatching batch");
            if engine_tx.send(EngineEvent::Batch(batch)).await.is_err() {
                debug!("engine channel closed; stopping debouncer");
                break;
            }
        }

        debouncer.clear();
        debug!("debouncer finished");
    });

    DebouncerHandle { task }
}
