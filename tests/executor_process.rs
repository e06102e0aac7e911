// tests/executor_process.rs
#![cfg(unix)]

use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

use watchcmd::engine::{Dispatch, EngineEvent};
use watchcmd::exec::{
    ExecutorBackend, NullSink, OutputChunk, OutputSink, RealExecutorBackend, RunRecord,
    RunStatus, Stream, run_command,
};
use watchcmd::types::Phase;
use watchcmd_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn dispatch(id: u64, command: &str) -> Dispatch {
    Dispatch {
        id,
        phase: Phase::Change,
        label: format!("run-{id}"),
        command: command.to_string(),
    }
}

#[derive(Default)]
struct CollectingSink {
    chunks: Mutex<Vec<OutputChunk>>,
    finished: Mutex<Vec<u64>>,
}

impl OutputSink for CollectingSink {
    fn chunk(&self, chunk: &OutputChunk) {
        self.chunks.lock().unwrap().push(chunk.clone());
    }

    fn run_finished(&self, record: &RunRecord) {
        self.finished.lock().unwrap().push(record.id);
    }
}

#[tokio::test]
async fn records_output_streams_and_exit_code() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = Arc::new(CollectingSink::default());
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let record = with_timeout(run_command(
        dispatch(1, "echo hello; echo oops 1>&2; exit 3"),
        dir.path(),
        sink.clone(),
        cancel_rx,
    ))
    .await;

    assert_eq!(record.status, Some(RunStatus::Exited(3)));
    assert_eq!(record.exit_code(), Some(3));
    assert_eq!(record.output_text(Stream::Stdout), "hello\n");
    assert_eq!(record.output_text(Stream::Stderr), "oops\n");
    assert!(record.finished_at.is_some());

    let chunks = sink.chunks.lock().unwrap();
    assert!(chunks.iter().all(|c| c.run == 1 && c.label == "run-1"));
    assert_eq!(*sink.finished.lock().unwrap(), vec![1]);
    Ok(())
}

#[tokio::test]
async fn runs_in_the_project_directory() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let record = with_timeout(run_command(
        dispatch(1, "pwd"),
        dir.path(),
        Arc::new(NullSink),
        cancel_rx,
    ))
    .await;

    let printed = record.output_text(Stream::Stdout);
    let printed = Path::new(printed.trim()).canonicalize()?;
    assert_eq!(printed, dir.path().canonicalize()?);
    assert!(record.status.as_ref().is_some_and(RunStatus::success));
    Ok(())
}

#[tokio::test]
async fn cancel_terminates_the_command() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let started = Instant::now();

    let run = tokio::spawn({
        let cwd = dir.path().to_path_buf();
        async move { run_command(dispatch(7, "sleep 30"), &cwd, Arc::new(NullSink), cancel_rx).await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel_tx
        .send(Duration::from_millis(500))
        .map_err(|_| "runner already gone")?;

    let record = with_timeout(run).await?;
    assert_eq!(record.status, Some(RunStatus::Killed));
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn term_ignoring_process_is_killed_after_grace() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let run = tokio::spawn({
        let cwd = dir.path().to_path_buf();
        async move {
            run_command(
                dispatch(8, "trap '' TERM; while :; do sleep 0.1; done"),
                &cwd,
                Arc::new(NullSink),
                cancel_rx,
            )
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel_tx
        .send(Duration::from_millis(300))
        .map_err(|_| "runner already gone")?;

    let record = with_timeout(run).await?;
    assert_eq!(record.status, Some(RunStatus::Killed));
    Ok(())
}

#[tokio::test]
async fn backend_reports_every_run_back_to_the_runtime() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (tx, mut rx) = mpsc::channel::<EngineEvent>(16);
    let mut backend = RealExecutorBackend::new(dir.path(), Arc::new(NullSink), tx);

    backend
        .dispatch(vec![dispatch(1, "echo A"), dispatch(2, "exit 4")])
        .await?;

    let mut codes = Vec::new();
    for _ in 0..2 {
        match with_timeout(rx.recv()).await {
            Some(EngineEvent::RunFinished(record)) => codes.push((record.id, record.exit_code())),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    codes.sort();
    assert_eq!(codes, vec![(1, Some(0)), (2, Some(4))]);
    Ok(())
}

#[tokio::test]
async fn backend_shutdown_kills_running_commands() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (tx, mut rx) = mpsc::channel::<EngineEvent>(16);
    let mut backend = RealExecutorBackend::new(dir.path(), Arc::new(NullSink), tx);

    backend.dispatch(vec![dispatch(1, "sleep 30")]).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.active_count(), 1);

    with_timeout(backend.shutdown(Duration::from_millis(500))).await?;
    assert_eq!(backend.active_count(), 0);

    match with_timeout(rx.recv()).await {
        Some(EngineEvent::RunFinished(record)) => {
            assert_eq!(record.status, Some(RunStatus::Killed));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_program_is_a_normal_failed_run() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let record = with_timeout(run_command(
        dispatch(1, "definitely-not-a-real-program-xyz"),
        dir.path(),
        Arc::new(NullSink),
        cancel_rx,
    ))
    .await;

    // The shell itself starts; the program lookup fails inside it.
    assert_eq!(record.status, Some(RunStatus::Exited(127)));
    assert!(!record.output_text(Stream::Stderr).is_empty());
    Ok(())
}
