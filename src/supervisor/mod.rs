// src/supervisor/mod.rs

//! Owning a `watchcmd` engine as a controllable child process.
//!
//! A [`Supervisor`] starts the engine binary for a project, streams its
//! output (converted from ANSI to HTML) to `on_output` observers, reports
//! lifecycle changes to `on_status` observers and stops it again on request.
//!
//! State machine:
//!
//! ```text
//! Idle ──start──▶ Starting ──spawned──▶ Running ──stop──▶ Stopping ──▶ Idle
//!                    │                     │
//!                    └──config/spawn err──▶ Errored ◀── engine failed
//! ```
//!
//! Exactly one `Stopped` is emitted per `Started`: whichever side moves the
//! state out of `Running` (an explicit stop, or the engine exiting on its
//! own) emits it.

pub mod ansi;
pub mod observers;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{
    DEFAULT_CONFIG_FILE_NAME, load_and_validate, resolve_config_path, write_default,
};
use crate::errors::WatchcmdError;
use crate::exec::terminate::{StopSignal, own_process_group, signal_group};

pub use ansi::{AnsiConverter, DEFAULT_FOREGROUND, escape_html};
pub use observers::{Observers, Subscription};

/// How long to wait for the engine to exit after SIGKILL.
const KILL_WAIT: Duration = Duration::from_secs(2);
/// After the engine exits, how long to keep reading pipes still held open by
/// commands it left behind.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
const READ_BUF_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("No configuration file was found. The searched path was »{}«.", path.display())]
    ConfigurationMissing { path: PathBuf },

    #[error("Invalid configuration »{}«: {message}", path.display())]
    ConfigurationInvalid { path: PathBuf, message: String },

    #[error("Could not create configuration »{}«: {message}", path.display())]
    ConfigurationWrite { path: PathBuf, message: String },

    #[error("failed to start engine {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Stopping,
    /// Startup was refused or the engine failed; `start()` may be retried.
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` (or a restart) ended the engine.
    Requested,
    /// The engine exited on its own; `None` when killed by a signal.
    Exited(Option<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Started,
    Stopped { reason: StopReason },
    Errored { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
    /// Messages written by the supervisor itself.
    Diagnostic,
}

/// A piece of engine output, already converted to HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub source: OutputSource,
    pub html: String,
}

/// Opaque panel state owned by the embedding UI (visibility, height, ...).
///
/// The supervisor never interprets it; it is handed back unchanged by
/// [`Supervisor::view_state`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewState(pub toml::Table);

impl ViewState {
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.0.get(key)
    }

    pub fn into_table(self) -> toml::Table {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Path of the `watchcmd` engine binary.
    pub engine_program: PathBuf,
    /// Project root; the engine runs with this as working directory.
    pub project_dir: PathBuf,
    /// Config file, absolute or relative to `project_dir`.
    pub config_file_name: PathBuf,
    /// Time the engine gets after SIGTERM (to run its end phase) before it
    /// is killed.
    pub stop_grace: Duration,
    /// CSS color for text without an explicit ANSI foreground.
    pub foreground: String,
    pub view_state: ViewState,
}

impl SupervisorOptions {
    pub fn new(engine_program: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine_program: engine_program.into(),
            project_dir: project_dir.into(),
            config_file_name: PathBuf::from(DEFAULT_CONFIG_FILE_NAME),
            stop_grace: Duration::from_secs(15),
            foreground: DEFAULT_FOREGROUND.to_string(),
            view_state: ViewState::default(),
        }
    }
}

/// The running engine, as seen from outside the monitor task.
struct EngineHandle {
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
    exited: oneshot::Receiver<Option<i32>>,
    monitor: JoinHandle<()>,
}

struct Shared {
    state: SupervisorState,
    /// Incremented for every spawned engine so a stale monitor cannot touch
    /// the state of a newer one.
    generation: u64,
    engine: Option<EngineHandle>,
}

struct Inner {
    options: SupervisorOptions,
    foreground: Mutex<String>,
    shared: Mutex<Shared>,
    /// Serialises start/stop/toggle.
    op_lock: tokio::sync::Mutex<()>,
    status: Observers<StatusEvent>,
    output: Observers<OutputEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Inner {
    fn state(&self) -> SupervisorState {
        lock(&self.shared).state
    }

    fn set_state(&self, state: SupervisorState) {
        lock(&self.shared).state = state;
    }

    fn diagnostic(&self, text: &str) {
        self.output.emit(&OutputEvent {
            source: OutputSource::Diagnostic,
            html: escape_html(text),
        });
    }

    fn fail(&self, message: String) {
        self.set_state(SupervisorState::Errored);
        warn!(%message, "engine could not be started");
        self.diagnostic(&message);
        self.status.emit(&StatusEvent::Errored { message });
    }

    /// Called by the monitor when the engine process has exited and its
    /// output has been drained.
    fn engine_exited(&self, generation: u64, code: Option<i32>) {
        let unexpected = {
            let mut shared = lock(&self.shared);
            if shared.generation == generation && shared.state == SupervisorState::Running {
                shared.state = if code == Some(0) {
                    SupervisorState::Idle
                } else {
                    SupervisorState::Errored
                };
                shared.engine = None;
                true
            } else {
                false
            }
        };

        if !unexpected {
            debug!(generation, ?code, "engine exited during stop");
            return;
        }

        let message = match code {
            Some(code) => format!("engine exited with code {code}"),
            None => "engine was terminated by a signal".to_string(),
        };
        info!(generation, ?code, "{message}");
        self.diagnostic(&message);
        self.status.emit(&StatusEvent::Stopped {
            reason: StopReason::Exited(code),
        });
    }
}

/// Controller for one engine process.
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state())
            .field("config_path", &self.config_path())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        let foreground = options.foreground.clone();
        Self {
            inner: Arc::new(Inner {
                options,
                foreground: Mutex::new(foreground),
                shared: Mutex::new(Shared {
                    state: SupervisorState::Idle,
                    generation: 0,
                    engine: None,
                }),
                op_lock: tokio::sync::Mutex::new(()),
                status: Observers::new(),
                output: Observers::new(),
            }),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.inner.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SupervisorState::Running
    }

    /// Absolute (or project-relative, joined) path of the config file.
    pub fn config_path(&self) -> PathBuf {
        resolve_config_path(
            &self.inner.options.project_dir,
            &self.inner.options.config_file_name,
        )
    }

    pub fn project_dir(&self) -> &Path {
        &self.inner.options.project_dir
    }

    pub fn view_state(&self) -> &ViewState {
        &self.inner.options.view_state
    }

    pub fn foreground(&self) -> String {
        lock(&self.inner.foreground).clone()
    }

    /// Change the default foreground used for converted output. Takes
    /// effect from the next chunk read.
    pub fn set_foreground(&self, color: impl Into<String>) {
        *lock(&self.inner.foreground) = color.into();
    }

    pub fn on_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.inner.status.subscribe(handler)
    }

    pub fn on_output<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&OutputEvent) + Send + Sync + 'static,
    {
        self.inner.output.subscribe(handler)
    }

    /// Write a commented starter config to [`Self::config_path`] if no file
    /// exists there yet, and return that path. An existing file is never
    /// touched.
    pub fn create_config(&self) -> Result<PathBuf, SupervisorError> {
        let path = self.config_path();
        match write_default(&path) {
            Ok(true) => {
                info!(config = ?path, "configuration file created");
                self.inner.diagnostic(&format!(
                    "Configuration file was successfully created: {}",
                    path.display()
                ));
            }
            Ok(false) => debug!(config = ?path, "configuration file already exists"),
            Err(err) => {
                return Err(SupervisorError::ConfigurationWrite {
                    path,
                    message: err.to_string(),
                });
            }
        }
        Ok(path)
    }

    /// Start the engine. If it is already running it is stopped first.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _op = self.inner.op_lock.lock().await;
        if self.inner.state() == SupervisorState::Running {
            info!("engine already running; restarting");
            self.stop_locked().await;
        }
        self.start_locked().await
    }

    /// Stop the engine if it is running. A no-op otherwise.
    pub async fn stop(&self) {
        let _op = self.inner.op_lock.lock().await;
        self.stop_locked().await;
    }

    /// `start()` when not running, `stop()` when running.
    pub async fn toggle(&self) -> Result<(), SupervisorError> {
        let _op = self.inner.op_lock.lock().await;
        if self.inner.state() == SupervisorState::Running {
            self.stop_locked().await;
            Ok(())
        } else {
            self.start_locked().await
        }
    }

    async fn start_locked(&self) -> Result<(), SupervisorError> {
        let inner = &self.inner;
        let path = self.config_path();
        inner.set_state(SupervisorState::Starting);

        match load_and_validate(&path) {
            Ok(_) => {}
            Err(WatchcmdError::ConfigMissing { path }) => {
                let err = SupervisorError::ConfigurationMissing { path };
                inner.fail(err.to_string());
                return Err(err);
            }
            Err(other) => {
                let err = SupervisorError::ConfigurationInvalid {
                    path,
                    message: other.to_string(),
                };
                inner.fail(err.to_string());
                return Err(err);
            }
        }

        let program = inner.options.engine_program.clone();
        let mut cmd = Command::new(&program);
        own_process_group(&mut cmd)
            .arg(&path)
            .arg("--color")
            .current_dir(&inner.options.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = SupervisorError::Spawn { program, source };
                inner.fail(err.to_string());
                return Err(err);
            }
        };

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = oneshot::channel();

        let generation = {
            let mut shared = lock(&inner.shared);
            shared.generation += 1;
            shared.state = SupervisorState::Running;
            shared.generation
        };

        info!(?pid, generation, config = ?path, "engine started");
        inner.status.emit(&StatusEvent::Started);

        // Spawned only after `Started` went out so no output or `Stopped`
        // can overtake it.
        let monitor = tokio::spawn(monitor(
            Arc::clone(inner),
            generation,
            child,
            kill_rx,
            exited_tx,
        ));

        let mut shared = lock(&inner.shared);
        if shared.generation == generation && shared.state == SupervisorState::Running {
            shared.engine = Some(EngineHandle {
                pid,
                kill: Some(kill_tx),
                exited: exited_rx,
                monitor,
            });
        }
        Ok(())
    }

    async fn stop_locked(&self) {
        let inner = &self.inner;
        let handle = {
            let mut shared = lock(&inner.shared);
            if shared.state != SupervisorState::Running {
                return;
            }
            shared.state = SupervisorState::Stopping;
            shared.engine.take()
        };

        if let Some(mut handle) = handle {
            let grace = inner.options.stop_grace;
            if let Some(pid) = handle.pid {
                debug!(pid, "sending SIGTERM to engine process group");
                signal_group(pid, StopSignal::Terminate);
            }

            if timeout(grace, &mut handle.exited).await.is_err() {
                warn!(?grace, "engine did not exit in time; killing");
                if let Some(pid) = handle.pid {
                    signal_group(pid, StopSignal::Kill);
                }
                if let Some(kill) = handle.kill.take() {
                    let _ = kill.send(());
                }
                if timeout(KILL_WAIT, &mut handle.exited).await.is_err() {
                    warn!("engine still not reaped after kill; abandoning monitor");
                    handle.monitor.abort();
                }
            }
        }

        inner.set_state(SupervisorState::Idle);
        info!("engine stopped");
        inner.status.emit(&StatusEvent::Stopped {
            reason: StopReason::Requested,
        });
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let engine = lock(&self.inner.shared).engine.take();
        if let Some(mut engine) = engine {
            if let Some(pid) = engine.pid {
                signal_group(pid, StopSignal::Kill);
            }
            if let Some(kill) = engine.kill.take() {
                let _ = kill.send(());
            }
        }
    }
}

/// Owns the engine child: forwards its output and reports its exit.
async fn monitor(
    inner: Arc<Inner>,
    generation: u64,
    mut child: Child,
    mut kill: oneshot::Receiver<()>,
    exited: oneshot::Sender<Option<i32>>,
) {
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_output(
            Arc::clone(&inner),
            stdout,
            OutputSource::Stdout,
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_output(
            Arc::clone(&inner),
            stderr,
            OutputSource::Stderr,
        )));
    }

    let mut kill_open = true;
    let status = loop {
        tokio::select! {
            res = child.wait() => break res,
            req = &mut kill, if kill_open => {
                kill_open = false;
                if req.is_ok() {
                    if let Err(err) = child.start_kill() {
                        debug!(error = %err, "failed to kill engine");
                    }
                }
            }
        }
    };

    for reader in readers {
        if timeout(DRAIN_TIMEOUT, reader).await.is_err() {
            debug!("engine output still open after exit; detaching reader");
        }
    }

    let code = match status {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(error = %err, "failed to wait for engine");
            None
        }
    };

    inner.engine_exited(generation, code);
    let _ = exited.send(code);
}

async fn forward_output<R>(inner: Arc<Inner>, mut reader: R, source: OutputSource)
where
    R: AsyncRead + Unpin,
{
    let mut converter = AnsiConverter::new(lock(&inner.foreground).clone());
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                debug!(?source, error = %err, "engine pipe read failed");
                break;
            }
        };

        let foreground = lock(&inner.foreground).clone();
        if converter.default_fg() != foreground {
            converter.set_default_fg(foreground);
        }

        let html = converter.convert(&buf[..n]);
        if !html.is_empty() {
            inner.output.emit(&OutputEvent { source, html });
        }
    }
}
