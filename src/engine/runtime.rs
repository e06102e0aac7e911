// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::EngineCore;
use super::{CoreCommand, EngineEvent, RuntimeOptions};

/// Anything that must stay alive while the engine watches files
/// (watcher handle, debouncer handle). Dropped on `StopWatching`.
pub type WatchGuard = Box<dyn Send>;

/// Drives the [`EngineCore`] in response to [`EngineEvent`]s and delegates
/// command execution to an [`ExecutorBackend`].
///
/// This is the async IO shell around the core: it reads events from the
/// channel, arms the end-phase timer, drops the watch guards when shutdown
/// begins and terminates leftover commands on exit.
pub struct Runtime<E: ExecutorBackend> {
    core: EngineCore,
    event_rx: mpsc::Receiver<EngineEvent>,
    event_tx: mpsc::Sender<EngineEvent>,
    executor: E,
    options: RuntimeOptions,
    watch_guards: Vec<WatchGuard>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    /// `event_tx` must feed `event_rx`; the runtime uses it for its own
    /// timers.
    pub fn new(
        core: EngineCore,
        event_rx: mpsc::Receiver<EngineEvent>,
        event_tx: mpsc::Sender<EngineEvent>,
        executor: E,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            options,
            watch_guards: Vec::new(),
        }
    }

    /// Keep `guard` alive until shutdown begins.
    pub fn with_watch_guard(mut self, guard: impl Send + 'static) -> Self {
        self.watch_guards.push(Box::new(guard));
        self
    }

    /// Main event loop.
    ///
    /// Returns once the core asks to exit (end phase done or timed out) or
    /// the event channel closes. Commands still running at that point are
    /// terminated before returning.
    pub async fn run(mut self) -> Result<()> {
        info!("watchcmd runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            let mut exit = false;
            for command in step.commands {
                exit |= self.execute_command(command).await?;
            }

            if exit || !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.watch_guards.clear();
        self.event_rx.close();
        self.executor.shutdown(self.options.kill_grace).await?;

        info!("runtime exiting");
        Ok(())
    }

    /// Execute a single command from the core. Returns true on `Exit`.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<bool> {
        match command {
            CoreCommand::Dispatch(runs) => {
                debug!(
                    labels = ?runs.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
                    "dispatching runs"
                );
                self.executor.dispatch(runs).await?;
            }
            CoreCommand::StopWatching => {
                debug!(guards = self.watch_guards.len(), "stopping file watching");
                self.watch_guards.clear();
            }
            CoreCommand::StartEndTimer => {
                let tx = self.event_tx.clone();
                let after = self.options.end_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(EngineEvent::EndTimeout).await;
                });
            }
            CoreCommand::Exit => return Ok(true),
        }
        Ok(false)
    }
}
