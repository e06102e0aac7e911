// src/exec/runner.rs

//! Individual command process runner.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::engine::Dispatch;
use crate::exec::output::OutputSink;
use crate::exec::record::{RunRecord, RunStatus, Stream};
use crate::exec::terminate::{shell_command, terminate_child};

const READ_BUF_SIZE: usize = 8 * 1024;

/// After the process exits, how long to keep reading pipes that a detached
/// grandchild may still hold open.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Run one dispatched command to completion and return its closed record.
///
/// - The command runs through the platform shell with `cwd` as working
///   directory. It stays in the engine's process group so a group kill
///   aimed at the engine reaches it too.
/// - stdout and stderr are read as raw chunks as they arrive; each chunk is
///   appended to the record and forwarded to `sink`.
/// - If `cancel` fires, the shell gets SIGTERM, then SIGKILL after
///   the carried grace period, and the run is closed as [`RunStatus::Killed`].
/// - A spawn failure closes the run as [`RunStatus::SpawnFailed`].
pub async fn run_command(
    dispatch: Dispatch,
    cwd: &Path,
    sink: Arc<dyn OutputSink>,
    cancel: oneshot::Receiver<Duration>,
) -> RunRecord {
    let mut record = RunRecord::open(&dispatch);

    if let Err(err) = run_inner(&mut record, cwd, sink.as_ref(), cancel).await {
        warn!(
            run = record.id,
            label = %record.label,
            error = %err,
            "command execution error"
        );
        if !record.is_closed() {
            record.close(RunStatus::SpawnFailed(format!("{err:#}")));
        }
    }

    sink.run_finished(&record);
    record
}

async fn run_inner(
    record: &mut RunRecord,
    cwd: &Path,
    sink: &dyn OutputSink,
    mut cancel: oneshot::Receiver<Duration>,
) -> Result<()> {
    info!(
        run = record.id,
        phase = %record.phase,
        label = %record.label,
        cmd = %record.command,
        "starting command"
    );

    let mut cmd = shell_command(&record.command);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning shell for '{}'", record.label))?;

    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<(Stream, Vec<u8>)>();
    if let Some(stdout) = child.stdout.take() {
        pump(stdout, Stream::Stdout, chunk_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        pump(stderr, Stream::Stderr, chunk_tx.clone());
    }
    drop(chunk_tx);

    let mut cancel_open = true;
    let status = loop {
        tokio::select! {
            Some((stream, data)) = chunk_rx.recv() => {
                let chunk = record.chunk(stream, data);
                sink.chunk(&chunk);
                record.output.push(chunk);
            }
            res = child.wait() => {
                let status = res.with_context(|| format!("waiting for '{}'", record.label))?;
                break RunStatus::Exited(status.code().unwrap_or(-1));
            }
            grace = &mut cancel, if cancel_open => match grace {
                Ok(grace) => {
                    info!(run = record.id, label = %record.label, "terminating command");
                    if let Err(err) = terminate_child(&mut child, grace).await {
                        warn!(run = record.id, error = %err, "failed to terminate command");
                    }
                    break RunStatus::Killed;
                }
                Err(_) => {
                    // Canceller went away without asking; keep running.
                    cancel_open = false;
                }
            },
        }
    };

    while let Ok(Some((stream, data))) = timeout(DRAIN_TIMEOUT, chunk_rx.recv()).await {
        let chunk = record.chunk(stream, data);
        sink.chunk(&chunk);
        record.output.push(chunk);
    }

    debug!(run = record.id, label = %record.label, ?status, "command closed");
    record.close(status);
    Ok(())
}

/// Forward raw reads from a child pipe until EOF.
fn pump<R>(mut reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, Vec<u8>)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(%stream, error = %err, "pipe read failed");
                    break;
                }
            }
        }
    });
}
