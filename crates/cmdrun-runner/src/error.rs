//! Error types for the runner

use cmdrun_utils::error::{ErrorCategory, UserFriendlyError};
use cmdrun_utils::exit_codes::ExitCode;
use thiserror::Error;

use crate::outcome::Outcome;

/// Rejected [`Invocation`](crate::Invocation) construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Invocation command is empty")]
    EmptyCommand,
}

impl UserFriendlyError for InvocationError {
    fn user_message(&self) -> String {
        match self {
            Self::EmptyCommand => "No program was given to run".to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::EmptyCommand => Some(
                "The first element of the command names the program; the rest are its arguments."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::EmptyCommand => vec!["Pass at least the program name, e.g. [\"git\", \"status\"]".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Invocation
    }
}

/// Control-flow signals a run hands back to its caller.
///
/// Spawn failures are deliberately absent: they are folded into the
/// [`Outcome`]'s exit code so callers have a single success/failure channel.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The run was interrupted. `partial` holds everything captured up to
    /// the point the child was stopped.
    #[error("Run of '{}' was cancelled (exit code {})", .partial.display_command(), .partial.exit_code)]
    Cancelled { partial: Box<Outcome> },

    /// Raised by [`Outcome::assert_success`] for a non-zero exit.
    #[error("Process '{}' failed with exit code {exit_code}", .command.join(" "))]
    ProcessFailed { exit_code: i32, command: Vec<String> },
}

impl ExecError {
    /// Exit code a calling tool should use when it gives up because of this error.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Cancelled { .. } => ExitCode::INTERRUPTED,
            Self::ProcessFailed { exit_code, .. } => ExitCode::from_i32(*exit_code),
        }
    }

    /// The captured outcome, if the error carries one.
    #[must_use]
    pub fn partial_outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Cancelled { partial } => Some(partial),
            Self::ProcessFailed { .. } => None,
        }
    }
}

impl UserFriendlyError for ExecError {
    fn user_message(&self) -> String {
        match self {
            Self::Cancelled { partial } => {
                format!("'{}' was interrupted", partial.display_command())
            }
            Self::ProcessFailed { exit_code, command } => {
                format!("'{}' exited with code {exit_code}", command.join(" "))
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Cancelled { .. } => Some(
                "The child was asked to stop (interrupt, then terminate, then kill) and its output up to that point was kept."
                    .to_string(),
            ),
            Self::ProcessFailed { exit_code, .. } => match ExitCode::from_i32(*exit_code) {
                ExitCode::NOT_FOUND => {
                    Some("The program could not be found on the invocation's PATH.".to_string())
                }
                ExitCode::PERMISSION_DENIED => {
                    Some("The program was found but could not be executed.".to_string())
                }
                code if code.as_i32() > 128 => Some(format!(
                    "The process appears to have been terminated by signal {}.",
                    code.as_i32() - 128
                )),
                _ => None,
            },
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Cancelled { .. } => vec!["Re-run the command to let it finish".to_string()],
            Self::ProcessFailed { exit_code, .. } => match ExitCode::from_i32(*exit_code) {
                ExitCode::NOT_FOUND => vec![
                    "Check the PATH entry of the invocation environment".to_string(),
                    "Use an absolute path for the program".to_string(),
                ],
                ExitCode::PERMISSION_DENIED => {
                    vec!["Check the file's execute permission".to_string()]
                }
                _ => vec!["Review the captured stderr above for details".to_string()],
            },
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled { .. } => ErrorCategory::Cancellation,
            Self::ProcessFailed { .. } => ErrorCategory::ProcessExecution,
        }
    }
}
