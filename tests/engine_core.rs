// tests/engine_core.rs

use watchcmd::engine::{CommandSpec, CoreCommand, CoreStep, Dispatch, EngineEvent};
use watchcmd::exec::{RunRecord, RunStatus};
use watchcmd::types::{ChangeBatch, Phase, WatchEvent};
use watchcmd_test_utils::builders::{ConfigFileBuilder, on_suffix};
use watchcmd_test_utils::init_tracing;

fn dispatched(step: &CoreStep) -> Vec<Dispatch> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Dispatch(runs) => Some(runs.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn commands(step: &CoreStep) -> Vec<String> {
    dispatched(step).into_iter().map(|d| d.command).collect()
}

fn finished(dispatch: &Dispatch, code: i32) -> EngineEvent {
    let mut record = RunRecord::open(dispatch);
    record.close(RunStatus::Exited(code));
    EngineEvent::RunFinished(record)
}

fn batch(events: impl IntoIterator<Item = WatchEvent>) -> EngineEvent {
    EngineEvent::Batch(events.into_iter().collect::<ChangeBatch>())
}

#[test]
fn start_phase_runs_once_in_config_order() {
    init_tracing();
    let mut core = ConfigFileBuilder::new("/proj")
        .on_start(CommandSpec::fixed("echo one"))
        .on_start(CommandSpec::fixed("echo two").named("second"))
        .core();

    let step = core.step(EngineEvent::StartRequested);
    assert!(step.keep_running);
    assert_eq!(commands(&step), vec!["echo one", "echo two"]);

    let runs = dispatched(&step);
    assert_eq!(runs[0].label, "echo one");
    assert_eq!(runs[1].label, "second");
    assert!(runs.iter().all(|r| r.phase == Phase::Start));

    let again = core.step(EngineEvent::StartRequested);
    assert!(again.commands.is_empty());
}

#[test]
fn note_txt_change_runs_fixed_then_conditional_once_each() {
    let mut core = ConfigFileBuilder::new("/proj")
        .delay_ms(500)
        .on_change(CommandSpec::fixed("echo A"))
        .on_change(on_suffix("echo B", ".txt"))
        .core();

    let step = core.step(batch([WatchEvent::change("/proj/note.txt")]));
    assert_eq!(commands(&step), vec!["echo A", "echo B"]);
    assert_eq!(core.running_count(), 2);
}

#[test]
fn identical_commands_run_once_per_batch() {
    let mut core = ConfigFileBuilder::new("/proj")
        .on_change(CommandSpec::fixed("make"))
        .on_change(on_suffix("lint", ".rs"))
        .core();

    let step = core.step(batch([
        WatchEvent::change("/proj/a.rs"),
        WatchEvent::change("/proj/b.rs"),
        WatchEvent::add("/proj/README.md"),
    ]));
    assert_eq!(commands(&step), vec!["make", "lint"]);
}

#[test]
fn multi_path_batch_initiates_in_config_order() {
    let mut core = ConfigFileBuilder::new("/proj")
        .on_change(on_suffix("build-txt", ".txt"))
        .on_change(CommandSpec::fixed("rsync"))
        .core();

    // `a.css` sorts first but only selects the second command.
    let step = core.step(batch([
        WatchEvent::change("/proj/a.css"),
        WatchEvent::change("/proj/b.txt"),
    ]));
    assert_eq!(commands(&step), vec!["build-txt", "rsync"]);
}

#[test]
fn unmatched_batch_dispatches_nothing() {
    let mut core = ConfigFileBuilder::new("/proj")
        .on_change(on_suffix("echo B", ".txt"))
        .core();

    let step = core.step(batch([WatchEvent::change("/proj/style.css")]));
    assert!(step.commands.is_empty());
    assert!(step.keep_running);
}

#[test]
fn failing_command_does_not_stop_the_engine() {
    let mut core = ConfigFileBuilder::new("/proj")
        .on_change(CommandSpec::fixed("false"))
        .core();

    let step = core.step(batch([WatchEvent::change("/proj/x")]));
    let run = dispatched(&step).remove(0);

    let after = core.step(finished(&run, 1));
    assert!(after.keep_running);
    assert!(after.commands.is_empty());
    assert_eq!(core.running_count(), 0);
}

#[test]
fn shutdown_runs_end_phase_exactly_once() {
    let mut core = ConfigFileBuilder::new("/proj")
        .on_end(CommandSpec::fixed("echo bye"))
        .core();

    let step = core.step(EngineEvent::ShutdownRequested);
    assert!(step.keep_running);
    assert_eq!(step.commands.first(), Some(&CoreCommand::StopWatching));
    assert_eq!(step.commands.last(), Some(&CoreCommand::StartEndTimer));
    assert_eq!(commands(&step), vec!["echo bye"]);
    assert!(core.is_ending());

    let repeated = core.step(EngineEvent::ShutdownRequested);
    assert!(repeated.commands.is_empty());
    assert_eq!(core.end_phase_runs(), 1);

    // Changes arriving during the end phase are dropped.
    let late = core.step(batch([WatchEvent::change("/proj/late.txt")]));
    assert!(late.commands.is_empty());

    let run = dispatched(&step).remove(0);
    let done = core.step(finished(&run, 0));
    assert!(!done.keep_running);
    assert_eq!(done.commands, vec![CoreCommand::Exit]);
}

#[test]
fn shutdown_without_end_commands_exits_immediately() {
    let mut core = ConfigFileBuilder::new("/proj").core();

    let step = core.step(EngineEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert_eq!(step.commands, vec![CoreCommand::StopWatching, CoreCommand::Exit]);
}

#[test]
fn end_timeout_forces_exit() {
    let mut core = ConfigFileBuilder::new("/proj")
        .on_end(CommandSpec::fixed("sleep 100"))
        .core();

    core.step(EngineEvent::ShutdownRequested);
    let step = core.step(EngineEvent::EndTimeout);
    assert!(!step.keep_running);
    assert_eq!(step.commands, vec![CoreCommand::Exit]);
}

#[test]
fn stray_end_timeout_is_ignored_while_watching() {
    let mut core = ConfigFileBuilder::new("/proj").core();
    let step = core.step(EngineEvent::EndTimeout);
    assert!(step.keep_running);
    assert!(step.commands.is_empty());
}
