// src/exec/terminate.rs

//! Process termination shared by the executor and the supervisor.
//!
//! The supervisor starts the engine as the leader of a new process group.
//! Commands are not given groups of their own; they stay in the engine's
//! group, so a single group signal from the supervisor reaches the engine and
//! every command it started, even when the engine itself is SIGKILLed.
//!
//! The engine terminates an individual command by signalling its pid:
//! SIGTERM, a grace period, then SIGKILL.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Build a shell invocation for `command_line` appropriate for the platform.
pub fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

/// Make the spawned child the leader of a new process group (unix only).
pub fn own_process_group(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Ask a command to exit, escalating to a kill after `grace`.
///
/// Only the child itself is signalled; it shares its process group with the
/// engine.
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    if let (true, Some(pid)) = (cfg!(unix), child.id()) {
        signal_process(pid, StopSignal::Terminate);
        match timeout(grace, child.wait()).await {
            Ok(status) => return status,
            Err(_) => warn!(pid, ?grace, "process did not exit after SIGTERM; killing"),
        }
    }

    child.kill().await?;
    child.wait().await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
impl From<StopSignal> for nix::sys::signal::Signal {
    fn from(sig: StopSignal) -> Self {
        match sig {
            StopSignal::Terminate => Self::SIGTERM,
            StopSignal::Kill => Self::SIGKILL,
        }
    }
}

/// Send `sig` to the single process `pid`.
#[cfg(unix)]
pub fn signal_process(pid: u32, sig: StopSignal) {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let pid = Pid::from_raw(pid as i32);
    if let Err(err) = kill(pid, nix::sys::signal::Signal::from(sig)) {
        debug!(%pid, ?sig, error = %err, "signal failed");
    }
}

/// Send `sig` to the process group led by `pid`, falling back to the process
/// itself when the group is gone.
#[cfg(unix)]
pub fn signal_group(pid: u32, sig: StopSignal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if let Err(err) = killpg(Pid::from_raw(pid as i32), nix::sys::signal::Signal::from(sig)) {
        debug!(pid, ?sig, error = %err, "group signal failed; signalling process directly");
        signal_process(pid, sig);
    }
}

#[cfg(not(unix))]
pub fn signal_process(_pid: u32, _sig: StopSignal) {
    // No signals; `terminate_child` falls through to `Child::kill`.
}

#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _sig: StopSignal) {}
