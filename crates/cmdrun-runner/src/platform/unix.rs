use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Mutex, PoisonError};

use cmdrun_utils::exit_codes::ExitCode;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, sigaction};
use nix::unistd::Pid;

/// Nothing to do: a plain child can already be signalled by pid.
pub(crate) fn configure_command(_cmd: &mut Command) {}

pub(crate) fn send_interrupt(child: &mut Child) -> io::Result<()> {
    signal(child, Signal::SIGINT)
}

pub(crate) fn send_terminate(child: &mut Child) -> io::Result<()> {
    signal(child, Signal::SIGTERM)
}

fn signal(child: &Child, sig: Signal) -> io::Result<()> {
    let pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    kill(Pid::from_raw(pid), sig).map_err(io::Error::from)
}

/// Exit code of a finished child; signal terminations map to `128 + signal`.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    match status.signal() {
        Some(sig) => ExitCode::from_signal(sig).as_i32(),
        None => ExitCode::FAILURE.as_i32(),
    }
}

/// Guards alive in this process and the `SIGINT` action they replaced.
struct GuardState {
    depth: usize,
    previous: Option<SigAction>,
}

static GUARD_STATE: Mutex<GuardState> = Mutex::new(GuardState {
    depth: 0,
    previous: None,
});

/// Ignores `SIGINT` in the whole process until dropped.
///
/// Signal dispositions are process-wide, so nested or concurrent guards share
/// one change: the first guard installs `SIG_IGN` and the last one to drop
/// restores the previous action. A child spawned by another thread while a
/// guard is held inherits the ignored disposition.
pub(crate) struct InterruptGuard(());

impl InterruptGuard {
    pub(crate) fn acquire() -> io::Result<Self> {
        let mut state = GUARD_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        if state.depth == 0 {
            let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
            // SAFETY: SIG_IGN runs no code in signal context.
            let previous = unsafe { sigaction(Signal::SIGINT, &ignore) }.map_err(io::Error::from)?;
            state.previous = Some(previous);
        }
        state.depth += 1;
        Ok(Self(()))
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let mut state = GUARD_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            if let Some(previous) = state.previous.take() {
                // SAFETY: reinstates the action that was in place before `acquire`.
                let _ = unsafe { sigaction(Signal::SIGINT, &previous) };
            }
        }
    }
}
