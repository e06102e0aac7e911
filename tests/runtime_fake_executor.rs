// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use watchcmd::config::ConfigFile;
use watchcmd::engine::{CommandSpec, EngineCore, EngineEvent, Runtime, RuntimeOptions};
use watchcmd::types::{Phase, WatchEvent};
use watchcmd::watch::spawn_debouncer;
use watchcmd_test_utils::builders::{ConfigFileBuilder, on_suffix};
use watchcmd_test_utils::fake_executor::{FakeExecutor, Recorded};
use watchcmd_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// One engine wired like `watchcmd::run`, minus the notify watcher: tests
/// push raw events straight into the debouncer.
struct Harness {
    raw_tx: mpsc::Sender<WatchEvent>,
    event_tx: mpsc::Sender<EngineEvent>,
    recorded: Arc<Mutex<Recorded>>,
    task: JoinHandle<watchcmd::errors::Result<()>>,
}

impl Harness {
    fn start(cfg: &ConfigFile, hold: Option<Phase>) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(64);
        let (raw_tx, raw_rx) = mpsc::channel::<WatchEvent>(64);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut executor = FakeExecutor::new(event_tx.clone(), Arc::clone(&recorded));
        if let Some(phase) = hold {
            executor = executor.hold(phase);
        }

        let debouncer = spawn_debouncer(cfg.delay, raw_rx, event_tx.clone());
        let options = RuntimeOptions {
            end_timeout: cfg.end_timeout,
            ..RuntimeOptions::default()
        };
        let runtime = Runtime::new(
            EngineCore::from_config(cfg),
            event_rx,
            event_tx.clone(),
            executor,
            options,
        )
        .with_watch_guard(debouncer);

        Self {
            raw_tx,
            event_tx,
            recorded,
            task: tokio::spawn(runtime.run()),
        }
    }

    fn commands_in(&self, phase: Phase) -> Vec<String> {
        self.recorded.lock().unwrap().commands_in(phase)
    }

    async fn shutdown(self) -> Result<Arc<Mutex<Recorded>>, Box<dyn Error>> {
        self.event_tx.send(EngineEvent::ShutdownRequested).await?;
        with_timeout(self.task).await??;
        Ok(self.recorded)
    }
}

#[tokio::test(start_paused = true)]
async fn burst_on_note_txt_dispatches_a_then_b_once() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new("/proj")
        .delay_ms(500)
        .on_change(CommandSpec::fixed("echo A"))
        .on_change(on_suffix("echo B", ".txt"))
        .build();
    let engine = Harness::start(&cfg, None);

    engine.raw_tx.send(WatchEvent::change("/proj/note.txt")).await?;
    sleep(Duration::from_millis(100)).await;
    engine.raw_tx.send(WatchEvent::change("/proj/note.txt")).await?;

    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(engine.commands_in(Phase::Change), vec!["echo A", "echo B"]);

    let recorded = engine.shutdown().await?;
    assert_eq!(recorded.lock().unwrap().shutdowns, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn start_phase_runs_on_start_request() -> TestResult {
    let cfg = ConfigFileBuilder::new("/proj")
        .on_start(CommandSpec::fixed("sass --watch css"))
        .build();
    let engine = Harness::start(&cfg, None);

    engine.event_tx.send(EngineEvent::StartRequested).await?;
    engine.event_tx.send(EngineEvent::StartRequested).await?;
    sleep(Duration::from_millis(50)).await;

    assert_eq!(engine.commands_in(Phase::Start), vec!["sass --watch css"]);
    engine.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_shutdown_requests_run_end_commands_once() -> TestResult {
    let cfg = ConfigFileBuilder::new("/proj")
        .on_end(CommandSpec::fixed("echo bye"))
        .build();
    let engine = Harness::start(&cfg, None);

    engine.event_tx.send(EngineEvent::ShutdownRequested).await?;
    let recorded = engine.shutdown().await?;

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.commands_in(Phase::End), vec!["echo bye"]);
    assert_eq!(recorded.shutdowns, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hung_end_phase_is_cut_off_by_timeout() -> TestResult {
    let cfg = ConfigFileBuilder::new("/proj")
        .end_timeout_ms(2_000)
        .on_end(CommandSpec::fixed("sleep 3600"))
        .build();
    let engine = Harness::start(&cfg, Some(Phase::End));

    // Paused time auto-advances to the end timer.
    let recorded = engine.shutdown().await?;
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.commands_in(Phase::End), vec!["sleep 3600"]);
    assert_eq!(recorded.shutdowns, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_leaves_no_stale_timers() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new("/proj")
        .delay_ms(500)
        .on_change(CommandSpec::fixed("echo changed"))
        .build();

    // First engine: a change is still pending when the engine is stopped.
    let first = Harness::start(&cfg, None);
    first.raw_tx.send(WatchEvent::change("/proj/a.txt")).await?;
    sleep(Duration::from_millis(100)).await;
    let first_recorded = first.shutdown().await?;

    // Second engine: one lone change.
    let second = Harness::start(&cfg, None);
    sleep(Duration::from_millis(1_000)).await;
    second.raw_tx.send(WatchEvent::change("/proj/b.txt")).await?;
    sleep(Duration::from_millis(1_000)).await;

    assert!(first_recorded.lock().unwrap().commands_in(Phase::Change).is_empty());
    assert_eq!(second.commands_in(Phase::Change), vec!["echo changed"]);
    second.shutdown().await?;
    Ok(())
}
