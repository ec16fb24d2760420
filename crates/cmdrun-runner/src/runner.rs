use std::sync::Arc;
use std::time::Instant;

use cmdrun_config::RunnerConfig;
use cmdrun_utils::logging::run_span;
use tracing::{debug, info};

use crate::capture::OutputCapture;
use crate::error::ExecError;
use crate::handle::{LocalProcessHandle, ProcessHandle};
use crate::interrupt::{InterruptChecker, NeverInterrupted};
use crate::invocation::Invocation;
use crate::outcome::Outcome;
use crate::platform::InterruptGuard;
use crate::types::{RunStatus, Stream};

// ============================================================================
// Runner - orchestrates one run: capture, supervise, build the Outcome
// ============================================================================

/// Runs invocations and turns them into [`Outcome`]s.
///
/// Implementors only choose how handles are made and where cancellation comes
/// from; [`run`](Self::run) is shared.
pub trait Runner {
    type Handle: ProcessHandle;

    /// A fresh handle for one run of `invocation`.
    fn create_handle(&self, invocation: Arc<Invocation>) -> Self::Handle;

    /// Polled while the child runs.
    fn interrupt_checker(&self) -> &dyn InterruptChecker;

    /// Run `invocation` to completion.
    ///
    /// Both streams are always captured. With `echo_to_console` they are also
    /// copied to this process's stdout/stderr as they arrive. A non-zero exit
    /// is reported through [`Outcome::exit_code`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] if the interrupt checker fired. The
    /// child has been stopped by then and the error carries everything it
    /// wrote.
    fn run(
        &self,
        invocation: impl Into<Arc<Invocation>>,
        echo_to_console: bool,
    ) -> Result<Outcome, ExecError> {
        let invocation = invocation.into();
        let span = run_span(invocation.program(), invocation.cwd());
        let _entered = span.enter();

        let started_at = Instant::now();
        let stdout = OutputCapture::new(Stream::Stdout, echo_to_console);
        let stderr = OutputCapture::new(Stream::Stderr, echo_to_console);

        let mut handle = self.create_handle(Arc::clone(&invocation));
        let status = handle.run(stdout.handler(), stderr.handler(), self.interrupt_checker());

        let (exit_code, cancelled) = match status {
            RunStatus::Exited(code) => (code, false),
            RunStatus::Interrupted => {
                let guard = InterruptGuard::acquire()
                    .inspect_err(|err| debug!(error = %err, "Could not ignore interrupts"))
                    .ok();
                let code = handle.interrupt();
                drop(guard);
                (code, true)
            }
        };

        let resolved_command = handle.resolved_command().to_vec();
        // Joins the drainers, which releases the capture handlers.
        drop(handle);

        let outcome = Outcome::new(
            invocation,
            exit_code,
            stdout.finish(),
            stderr.finish(),
            resolved_command,
            started_at,
            Instant::now(),
            echo_to_console,
        );

        if cancelled {
            info!(
                command = %outcome.display_command(),
                exit_code,
                "Run cancelled"
            );
            return Err(ExecError::Cancelled {
                partial: Box::new(outcome),
            });
        }

        debug!(
            exit_code,
            duration_ms = outcome.duration().as_millis() as u64,
            "Run finished"
        );
        Ok(outcome)
    }
}

/// [`Runner`] for processes on the local machine.
///
/// ```rust,no_run
/// use cmdrun_runner::{Invocation, LocalProcessRunner, Runner};
///
/// let runner = LocalProcessRunner::new();
/// let invocation = Invocation::new(["git", "status"])?.env("PATH", "/usr/bin:/bin");
/// let outcome = runner.run(invocation, false)?;
/// outcome.assert_success()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct LocalProcessRunner {
    config: RunnerConfig,
    interrupt: Arc<dyn InterruptChecker>,
}

impl LocalProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            config,
            interrupt: Arc::new(NeverInterrupted),
        }
    }

    /// Use `checker` as the cancellation source.
    #[must_use]
    pub fn with_interrupt(mut self, checker: impl InterruptChecker + 'static) -> Self {
        self.interrupt = Arc::new(checker);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

impl Default for LocalProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProcessRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runner for LocalProcessRunner {
    type Handle = LocalProcessHandle;

    fn create_handle(&self, invocation: Arc<Invocation>) -> Self::Handle {
        LocalProcessHandle::new(invocation, self.config)
    }

    fn interrupt_checker(&self) -> &dyn InterruptChecker {
        self.interrupt.as_ref()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::interrupt::InterruptFlag;
    use serial_test::serial;
    use std::time::Duration;

    fn sh(script: &str) -> Invocation {
        Invocation::new(["sh", "-c", script])
            .unwrap()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
    }

    #[test]
    fn test_run_captures_both_streams() {
        let runner = LocalProcessRunner::new();
        let outcome = runner
            .run(sh("echo hi; echo oops >&2"), false)
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout(), "hi\n");
        assert_eq!(outcome.stderr(), "oops\n");
        assert!(!outcome.echoed_live);
        assert!(outcome.finished_at >= outcome.started_at);
        assert!(outcome.resolved_command[0].ends_with("sh"));
    }

    #[test]
    fn test_non_utf8_output_is_kept_verbatim() {
        let outcome = LocalProcessRunner::new()
            .run(sh("printf '\\377\\376ok'; printf '\\200' >&2; exit 1"), false)
            .unwrap();

        assert_eq!(outcome.stdout_bytes, [0xff, 0xfe, b'o', b'k']);
        assert_eq!(outcome.stderr_bytes, [0x80]);
        assert_eq!(outcome.stdout(), "\u{fffd}\u{fffd}ok");

        let (mut out, mut err) = (Vec::new(), Vec::new());
        assert!(outcome.assert_success_to(&mut out, &mut err).is_err());
        assert_eq!(out, [0xff, 0xfe, b'o', b'k']);
        assert_eq!(err, [0x80]);
    }

    #[test]
    fn test_non_zero_exit_is_not_an_error() {
        let outcome = LocalProcessRunner::new().run(sh("exit 1"), false).unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(!outcome.success());
    }

    #[test]
    fn test_missing_program_yields_synthetic_code() {
        let invocation = Invocation::new(["cmdrun-does-not-exist"])
            .unwrap()
            .env("PATH", "/nonexistent");
        let outcome = LocalProcessRunner::new().run(invocation, false).unwrap();

        assert_eq!(outcome.exit_code, 127);
        assert!(outcome.stdout().is_empty());
        assert!(outcome.stderr().is_empty());
        assert!(matches!(
            outcome.assert_success_to(&mut std::io::sink(), &mut std::io::sink()),
            Err(ExecError::ProcessFailed { exit_code: 127, .. })
        ));
    }

    #[test]
    #[serial(sigint)]
    fn test_cancellation_keeps_partial_output() {
        let flag = InterruptFlag::new();
        let trigger = flag.clone();
        let runner = LocalProcessRunner::new().with_interrupt(flag);

        let watcher = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            trigger.trigger();
        });
        let result = runner.run(sh("echo partial; exec sleep 30"), false);
        watcher.join().unwrap();

        match result {
            Err(ExecError::Cancelled { partial }) => {
                assert_eq!(partial.stdout(), "partial\n");
                assert!(partial.exit_code > 128, "exit code {}", partial.exit_code);
                assert!(partial.duration() < Duration::from_secs(10));
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
