//! Shared error reporting for cmdrun.
//!
//! Every public error type in the workspace implements [`UserFriendlyError`] so a
//! calling tool can render a consistent message with context and suggestions
//! without matching on each variant itself.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error that knows how to explain itself to the person running the tool.
pub trait UserFriendlyError {
    /// One-line description without internal jargon
    fn user_message(&self) -> String;

    /// Background that helps interpret the message, if any
    fn context(&self) -> Option<String>;

    /// Concrete next steps, most likely fix first
    fn suggestions(&self) -> Vec<String>;

    fn category(&self) -> ErrorCategory;

    /// Render message, context and suggestions as one block of text.
    fn display_for_user(&self) -> String {
        let mut out = format!("[{}] {}", self.category(), self.user_message());
        if let Some(context) = self.context() {
            out.push_str("\n\n");
            out.push_str(&context);
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                out.push_str("\n  - ");
                out.push_str(&suggestion);
            }
        }
        out
    }
}

/// Coarse grouping shown as a prefix in rendered errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Invocation,
    ProcessExecution,
    Cancellation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => f.write_str("Configuration"),
            Self::Invocation => f.write_str("Invocation"),
            Self::ProcessExecution => f.write_str("Process Execution"),
            Self::Cancellation => f.write_str("Cancellation"),
        }
    }
}

/// Problems loading or validating runner settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed runner configuration: {0}")]
    InvalidFile(String),

    #[error("Runner setting {key} rejected: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("The runner configuration could not be parsed: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Setting '{key}' is out of range ({value})")
            }
            Self::Read { path, .. } => {
                format!("Could not read configuration file {}", path.display())
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Runner settings are read from the [runner] table of a TOML document.".to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' option controls how long the runner waits or how much it reads at once."
            )),
            Self::Read { source, .. } => Some(format!("The operating system reported: {source}")),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Look for a missing quote, bracket or `=` near the reported position".to_string(),
                "Make sure values are integers, e.g. interrupt_timeout_ms = 300".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "poll_interval_ms" | "drain_poll_interval_ms" | "read_chunk_size" => {
                    vec!["Use a positive integer value".to_string()]
                }
                "interrupt_timeout_ms" | "terminate_timeout_ms" => vec![
                    "Use a value between 0 and 60000 milliseconds".to_string(),
                    "Delete the line to fall back to the built-in default".to_string(),
                ],
                _ => vec!["Delete the line to fall back to the built-in default".to_string()],
            },
            Self::Read { .. } => vec![
                "Check that the file exists and is readable".to_string(),
                "Omit the configuration file to use built-in defaults".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}
