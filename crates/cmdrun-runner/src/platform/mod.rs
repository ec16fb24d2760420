//! OS specifics of process control
//!
//! Every platform module provides the same small surface:
//!
//! - `configure_command`: spawn-time setup so the child can be signalled
//! - `send_interrupt` / `send_terminate`: the two polite escalation stages
//! - `exit_code`: map an `ExitStatus` to the integer stored in an `Outcome`
//! - `InterruptGuard`: ignore interrupts in this process while an
//!   escalation is in flight
//!
//! The final stage of escalation is always `Child::kill`, which std already
//! implements for both platforms.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::{InterruptGuard, configure_command, exit_code, send_interrupt, send_terminate};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::{
    InterruptGuard, configure_command, exit_code, send_interrupt, send_terminate,
};
