//! Foundation utilities shared by the cmdrun crates: error reporting, exit code
//! conventions and logging setup.

pub mod error;
pub mod exit_codes;
pub mod logging;

pub use error::{ConfigError, ErrorCategory, UserFriendlyError};
pub use exit_codes::ExitCode;
