use std::io;
use std::os::windows::process::CommandExt;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicUsize, Ordering};

use cmdrun_utils::exit_codes::ExitCode;
use windows::Win32::System::Console::{
    CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent, SetConsoleCtrlHandler,
};
use windows::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP;

/// Put the child in its own process group so console control events can be
/// addressed to it without hitting the caller.
pub(crate) fn configure_command(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP.0);
}

/// Ctrl+Break is the only console event deliverable to a single process group.
pub(crate) fn send_interrupt(child: &mut Child) -> io::Result<()> {
    // SAFETY: plain FFI call with a process-group id we own.
    unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, child.id()) }
        .map_err(|err| io::Error::other(err.to_string()))
}

/// Windows has no polite terminate; the second stage is a hard stop.
pub(crate) fn send_terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(ExitCode::FAILURE.as_i32())
}

/// Process-wide: the console handler list is global, so nested or concurrent
/// guards share one registration.
static GUARD_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Ignores Ctrl+C in this process until dropped.
pub(crate) struct InterruptGuard(());

impl InterruptGuard {
    pub(crate) fn acquire() -> io::Result<Self> {
        if GUARD_DEPTH.fetch_add(1, Ordering::AcqRel) == 0 {
            // SAFETY: a null handler toggles the process's Ctrl+C ignore flag.
            if let Err(err) = unsafe { SetConsoleCtrlHandler(None, true) } {
                GUARD_DEPTH.fetch_sub(1, Ordering::AcqRel);
                return Err(io::Error::other(err.to_string()));
            }
        }
        Ok(Self(()))
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if GUARD_DEPTH.fetch_sub(1, Ordering::AcqRel) == 1 {
            // SAFETY: see `acquire`.
            let _ = unsafe { SetConsoleCtrlHandler(None, false) };
        }
    }
}
