use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::error;

use crate::error::ExecError;
use crate::invocation::Invocation;

// ============================================================================
// Outcome - immutable record of one finished run
// ============================================================================

/// The result of running one [`Invocation`].
///
/// Built exactly once by a [`Runner`](crate::Runner) at the end of a run and
/// never modified afterwards. A non-zero `exit_code` is not an error by itself;
/// callers that want a hard failure use [`assert_success`](Self::assert_success).
#[derive(Debug)]
pub struct Outcome {
    /// The invocation this outcome belongs to
    pub invocation: Arc<Invocation>,
    /// Exit code of the child; 0 is success. Spawn failures and signal
    /// terminations use the synthetic codes from
    /// [`ExitCode`](cmdrun_utils::exit_codes::ExitCode).
    pub exit_code: i32,
    /// Captured standard output, byte for byte
    pub stdout_bytes: Vec<u8>,
    /// Captured standard error, byte for byte
    pub stderr_bytes: Vec<u8>,
    /// The command actually executed, after program resolution
    pub resolved_command: Vec<String>,
    pub started_at: Instant,
    pub finished_at: Instant,
    /// Whether the output was already shown on the console while the child ran
    pub echoed_live: bool,
    reported: AtomicBool,
}

impl Outcome {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        invocation: Arc<Invocation>,
        exit_code: i32,
        stdout_bytes: Vec<u8>,
        stderr_bytes: Vec<u8>,
        resolved_command: Vec<String>,
        started_at: Instant,
        finished_at: Instant,
        echoed_live: bool,
    ) -> Self {
        Self {
            invocation,
            exit_code,
            stdout_bytes,
            stderr_bytes,
            resolved_command,
            started_at,
            finished_at,
            echoed_live,
            reported: AtomicBool::new(false),
        }
    }

    /// Captured standard output as text. Invalid UTF-8 is replaced with
    /// U+FFFD; use [`stdout_bytes`](Self::stdout_bytes) for the exact bytes.
    #[must_use]
    pub fn stdout(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout_bytes)
    }

    /// Captured standard error as text (lossy UTF-8).
    #[must_use]
    pub fn stderr(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr_bytes)
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Wall time between spawn and the final drain.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }

    /// The resolved command joined with spaces, for messages.
    #[must_use]
    pub fn display_command(&self) -> String {
        if self.resolved_command.is_empty() {
            self.invocation.command().join(" ")
        } else {
            self.resolved_command.join(" ")
        }
    }

    /// Turn a non-zero exit into an error, showing the captured output on the
    /// real console first.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ProcessFailed`] when `exit_code != 0`.
    pub fn assert_success(&self) -> Result<(), ExecError> {
        self.assert_success_to(&mut io::stdout().lock(), &mut io::stderr().lock())
    }

    /// [`assert_success`](Self::assert_success) with explicit console writers.
    ///
    /// Captured output is written only if it was not already echoed live, and
    /// at most once per outcome no matter how often this is called.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ProcessFailed`] when `exit_code != 0`.
    pub fn assert_success_to(
        &self,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), ExecError> {
        if self.success() {
            return Ok(());
        }

        if !self.echoed_live && !self.reported.swap(true, Ordering::SeqCst) {
            // Console write failures must not mask the process failure itself.
            let _ = out.write_all(&self.stdout_bytes).and_then(|()| out.flush());
            let _ = err.write_all(&self.stderr_bytes).and_then(|()| err.flush());
        }

        error!(
            exit_code = self.exit_code,
            command = %self.display_command(),
            duration_ms = self.duration().as_millis() as u64,
            "Process failed"
        );

        Err(ExecError::ProcessFailed {
            exit_code: self.exit_code,
            command: self.resolved_command.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit_code: i32, echoed_live: bool) -> Outcome {
        outcome_with(exit_code, echoed_live, b"partial stdout\n", b"boom\n")
    }

    fn outcome_with(exit_code: i32, echoed_live: bool, stdout: &[u8], stderr: &[u8]) -> Outcome {
        let invocation = Arc::new(Invocation::new(["false-tool"]).unwrap());
        let started_at = Instant::now();
        Outcome::new(
            invocation,
            exit_code,
            stdout.to_vec(),
            stderr.to_vec(),
            vec!["/opt/bin/false-tool".to_string()],
            started_at,
            started_at + Duration::from_millis(5),
            echoed_live,
        )
    }

    #[test]
    fn test_success_is_silent() {
        let outcome = outcome(0, false);
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert!(outcome.assert_success_to(&mut out, &mut err).is_ok());
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn test_failure_reemits_output_once() {
        let outcome = outcome(1, false);
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let first = outcome.assert_success_to(&mut out, &mut err);
        let second = outcome.assert_success_to(&mut out, &mut err);

        assert!(matches!(first, Err(ExecError::ProcessFailed { exit_code: 1, .. })));
        assert!(second.is_err());
        assert_eq!(out, b"partial stdout\n");
        assert_eq!(err, b"boom\n");
    }

    #[test]
    fn test_failure_reemits_raw_bytes() {
        let outcome = outcome_with(1, false, b"\xff\xfeok", b"\x80");
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert!(outcome.assert_success_to(&mut out, &mut err).is_err());
        assert_eq!(out, b"\xff\xfeok");
        assert_eq!(err, b"\x80");
        assert_eq!(outcome.stdout(), "\u{fffd}\u{fffd}ok");
    }

    #[test]
    fn test_failure_after_live_echo_writes_nothing() {
        let outcome = outcome(2, true);
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let result = outcome.assert_success_to(&mut out, &mut err);

        assert!(matches!(result, Err(ExecError::ProcessFailed { exit_code: 2, .. })));
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn test_failure_carries_resolved_command() {
        let outcome = outcome(3, true);
        match outcome.assert_success_to(&mut io::sink(), &mut io::sink()) {
            Err(ExecError::ProcessFailed { command, .. }) => {
                assert_eq!(command, vec!["/opt/bin/false-tool".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_duration_and_display() {
        let outcome = outcome(0, false);
        assert_eq!(outcome.duration(), Duration::from_millis(5));
        assert!(outcome.finished_at >= outcome.started_at);
        assert_eq!(outcome.display_command(), "/opt/bin/false-tool");
    }
}
