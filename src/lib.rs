//! cmdrun - run child processes with live output capture and graceful interruption
//!
//! cmdrun can be used in two ways:
//! - **CLI**: `cmdrun [--echo] -- program args...` runs one command and exits
//!   with its exit code
//! - **Library**: build an [`Invocation`] and hand it to a [`Runner`]
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use cmdrun::{ExecError, Invocation, LocalProcessRunner, Runner};
//!
//! let runner = LocalProcessRunner::new();
//! let invocation = Invocation::new(["cargo", "fmt", "--check"])?
//!     .working_directory("/path/to/project")
//!     .env("PATH", "/usr/local/bin:/usr/bin:/bin");
//!
//! match runner.run(invocation, true) {
//!     Ok(outcome) => outcome.assert_success()?,
//!     Err(ExecError::Cancelled { partial }) => {
//!         eprintln!("cancelled; captured {} bytes of stderr", partial.stderr_bytes.len());
//!     }
//!     Err(err) => return Err(err.into()),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Runs are hermetic: the child sees exactly the environment of its
//! invocation, and the program is looked up on that environment's `PATH`.
//!
//! # Stable Public API
//!
//! - [`Invocation`] and [`Outcome`] - what to run and what happened
//! - [`Runner`], [`LocalProcessRunner`] - running invocations
//! - [`ProcessHandle`], [`LocalProcessHandle`] - supervision of one child
//! - [`StreamDrainer`] and [`OutputHandler`] - live output delivery
//! - [`InterruptChecker`], [`InterruptFlag`] - cancellation
//! - [`ExecError`], [`InvocationError`], [`ExitCode`] - errors and exit codes
//! - [`RunnerConfig`] - timing and buffer settings

pub mod cli;

pub use cmdrun_runner::{
    BoxedHandler, DrainerState, ExecError, InterruptChecker, InterruptFlag, Invocation,
    InvocationError, LocalProcessHandle, LocalProcessRunner, NeverInterrupted, Outcome,
    OutputCapture, OutputHandler, ProcessHandle, RunStatus, Runner, Stream, StreamDrainer,
    discard,
};

/// Timing and buffer settings for a [`LocalProcessRunner`].
///
/// Defaults suit interactive tools; load overrides from the `[runner]` table of
/// a TOML file with [`RunnerConfig::load`].
pub use cmdrun_config::RunnerConfig;

/// Exit codes used for synthetic and signal-derived results.
pub use cmdrun_utils::exit_codes::ExitCode;

/// Error types shared across the cmdrun crates.
pub use cmdrun_utils::error::{ConfigError, ErrorCategory, UserFriendlyError};

pub use cmdrun_utils::logging::init_tracing;
