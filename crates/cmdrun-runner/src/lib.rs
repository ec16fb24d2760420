//! Supervised execution of local child processes
//!
//! An [`Invocation`] describes what to run (argv, working directory, the
//! complete environment, stdin policy). A [`Runner`] starts it, streams both
//! output pipes to per-stream handlers while the child runs, and returns an
//! [`Outcome`] with the captured text and the exit code.
//!
//! # Execution model
//!
//! One controlling thread supervises the child with bounded liveness polls
//! and two [`StreamDrainer`] threads move its output. All three are joined
//! before a run returns, on every path.
//!
//! When the runner's [`InterruptChecker`] fires, the child is stopped by
//! escalation (interrupt, then terminate, then kill, with grace periods from
//! [`RunnerConfig`]) and the run returns [`ExecError::Cancelled`] carrying the
//! partial outcome.
//!
//! # Security Model
//!
//! Commands are always executed argv-style; nothing is passed through a shell.
//! The program is resolved against the invocation's own `PATH`, never the
//! caller's, and the child does not inherit the caller's environment.

pub mod capture;
pub mod drainer;
pub mod error;
pub mod handle;
pub mod handler;
pub mod interrupt;
pub mod invocation;
pub mod outcome;
mod platform;
pub mod runner;
pub mod types;

pub use capture::OutputCapture;
pub use cmdrun_config::RunnerConfig;
pub use drainer::{DrainSettings, PipeSource, StreamDrainer};
pub use error::{ExecError, InvocationError};
pub use handle::{LocalProcessHandle, ProcessHandle};
pub use handler::{BoxedHandler, OutputHandler, discard};
pub use interrupt::{InterruptChecker, InterruptFlag, NeverInterrupted};
pub use invocation::Invocation;
pub use outcome::Outcome;
pub use runner::{LocalProcessRunner, Runner};
pub use types::{DrainerState, RunStatus, Stream};
