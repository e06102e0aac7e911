// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::engine::{CommandSource, CommandSpec, EngineCore, EngineEvent, Runtime, RuntimeOptions};
use crate::exec::{ConsoleSink, OutputSink, RealExecutorBackend};
use crate::types::WatchEvent;

/// Printed on stdout once the watcher is armed and the start phase has been
/// requested.
pub const READY_BANNER: &str = "watchcmd: watching";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the file watcher and debouncer
/// - the engine core / runtime
/// - the process executor
/// - SIGTERM / Ctrl-C handling (both run the end phase)
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<()> {
    if args.dry_run {
        print_dry_run(Path::new(&args.config), &cfg);
        return Ok(());
    }

    // Runtime event channel.
    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(256);
    // Watcher -> debouncer channel.
    let (raw_tx, raw_rx) = mpsc::channel::<WatchEvent>(1024);

    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new());
    let executor = RealExecutorBackend::new(cfg.directory.clone(), sink, event_tx.clone());

    let debouncer = watch::spawn_debouncer(cfg.delay, raw_rx, event_tx.clone());
    let watcher = watch::spawn_watcher(cfg.directory.clone(), cfg.ignore.clone(), raw_tx)?;

    spawn_shutdown_listener(event_tx.clone())?;

    event_tx.send(EngineEvent::StartRequested).await?;
    println!("{READY_BANNER} {}", cfg.directory.display());

    let options = RuntimeOptions {
        end_timeout: cfg.end_timeout,
        ..RuntimeOptions::default()
    };

    let core = EngineCore::from_config(&cfg);
    let runtime = Runtime::new(core, event_rx, event_tx, executor, options)
        .with_watch_guard(watcher)
        .with_watch_guard(debouncer);

    runtime.run().await?;
    info!("watchcmd stopped");
    Ok(())
}

/// Translate SIGTERM and Ctrl-C into a graceful shutdown request.
///
/// Handlers are registered before returning, so a signal sent right after
/// the ready banner is never lost to the default disposition.
#[cfg(unix)]
fn spawn_shutdown_listener(tx: mpsc::Sender<EngineEvent>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = term.recv() => info!("SIGTERM received; shutting down"),
                Some(()) = interrupt.recv() => info!("interrupt received; shutting down"),
                else => return,
            }
            if tx.send(EngineEvent::ShutdownRequested).await.is_err() {
                return;
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_shutdown_listener(tx: mpsc::Sender<EngineEvent>) -> Result<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("watchcmd: failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received; shutting down");
            if tx.send(EngineEvent::ShutdownRequested).await.is_err() {
                return;
            }
        }
    });
    Ok(())
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(config_path: &Path, cfg: &ConfigFile) {
    println!("watchcmd dry-run");
    println!("  config = {}", config_path.display());
    println!("  directory = {}", cfg.directory.display());
    println!("  delay = {}ms", cfg.delay.as_millis());
    println!("  end_timeout = {}ms", cfg.end_timeout.as_millis());
    println!("  verbosity = {:?}", cfg.verbosity);
    println!("  ignore = {:?}", cfg.ignore);

    for (section, specs) in [
        ("commands_on_start", &cfg.commands_on_start),
        ("commands_on_change", &cfg.commands_on_change),
        ("commands_on_end", &cfg.commands_on_end),
    ] {
        println!();
        println!("{section} ({}):", specs.len());
        for spec in specs.iter() {
            println!("  - {}", describe(spec));
        }
    }

    debug!("dry-run complete (no execution)");
}

fn describe(spec: &CommandSpec) -> String {
    let body = match &spec.source {
        CommandSource::Fixed(cmd) => cmd.clone(),
        CommandSource::Conditional(_) => "<conditional>".to_string(),
    };
    match &spec.name {
        Some(name) => format!("{name}: {body}"),
        None => body,
    }
}
