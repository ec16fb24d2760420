//! Exit code conventions for cmdrun.
//!
//! The engine folds every way a child can end into a single integer so callers
//! have exactly one success/failure channel. The values follow the POSIX shell
//! conventions so they read naturally next to codes produced by real children.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Child exited normally with status 0 |
//! | 1 | `FAILURE` | Generic failure, including spawn errors other than the two below |
//! | 126 | `PERMISSION_DENIED` | Executable found but could not be executed |
//! | 127 | `NOT_FOUND` | Executable could not be found |
//! | 128+N | `from_signal(N)` | Child terminated by signal N |
//! | 130 | `INTERRUPTED` | The run was cancelled by an interrupt (128 + SIGINT) |

/// A process exit code.
///
/// `ExitCode` is a thin, copyable wrapper around `i32`. Use the named constants
/// for the well-known values, or [`as_i32()`](Self::as_i32) to hand the number
/// to `std::process::exit()`.
///
/// # Example
///
/// ```rust
/// use cmdrun_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::NOT_FOUND.as_i32(), 127);
/// assert_eq!(ExitCode::from_signal(9).as_i32(), 137);
/// assert!(ExitCode::SUCCESS.is_success());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - the child exited normally with status 0
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Generic failure
    pub const FAILURE: ExitCode = ExitCode(1);

    /// The executable exists but could not be executed
    pub const PERMISSION_DENIED: ExitCode = ExitCode(126);

    /// The executable could not be found
    pub const NOT_FOUND: ExitCode = ExitCode(127);

    /// The run was cancelled by an interrupt request
    pub const INTERRUPTED: ExitCode = ExitCode(130);

    /// Base added to a signal number for signal-terminated children.
    const SIGNAL_BASE: i32 = 128;

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an `ExitCode` from a raw value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Exit code for a child terminated by `signal`.
    #[must_use]
    pub const fn from_signal(signal: i32) -> Self {
        ExitCode(Self::SIGNAL_BASE + signal)
    }

    /// Map a spawn failure to its synthetic exit code.
    #[must_use]
    pub fn from_spawn_error(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => Self::PERMISSION_DENIED,
            _ => Self::FAILURE,
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
