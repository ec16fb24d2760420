use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::InvocationError;

// ============================================================================
// Invocation - immutable description of one child process run
// ============================================================================

/// Everything needed to start one child process.
///
/// The command is kept as discrete argv elements; nothing is ever passed
/// through a shell. The environment map is the *complete* environment of the
/// child: the calling process's own variables are not inherited, and the
/// `PATH` entry of this map (not the caller's) is used to resolve the program.
///
/// Construction performs no I/O. Builder methods consume and return the value,
/// and once handed to a runner the invocation is shared immutably.
///
/// # Example
///
/// ```rust
/// use cmdrun_runner::Invocation;
///
/// let invocation = Invocation::new(["git", "status", "--short"])?
///     .working_directory("/path/to/repo")
///     .env("PATH", "/usr/bin:/bin")
///     .allow_stdin(false);
///
/// assert_eq!(invocation.program(), "git");
/// assert_eq!(invocation.args(), ["status", "--short"]);
/// assert_eq!(invocation.search_path(), Some("/usr/bin:/bin"));
/// # Ok::<(), cmdrun_runner::InvocationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    command: Vec<String>,
    working_directory: PathBuf,
    environment: BTreeMap<String, String>,
    allow_stdin: bool,
}

impl Invocation {
    /// Create an invocation for `command`.
    ///
    /// Element 0 is the program, the rest are its arguments. The working
    /// directory defaults to `.`, the environment starts empty and stdin is
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::EmptyCommand`] if `command` has no elements or
    /// its program is the empty string.
    pub fn new<I, S>(command: I) -> Result<Self, InvocationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command: Vec<String> = command.into_iter().map(Into::into).collect();
        if command.first().is_none_or(String::is_empty) {
            return Err(InvocationError::EmptyCommand);
        }

        Ok(Self {
            command,
            working_directory: PathBuf::from("."),
            environment: BTreeMap::new(),
            allow_stdin: false,
        })
    }

    /// Set the directory the child starts in.
    #[must_use]
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Set one environment variable, replacing any previous value.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables.
    #[must_use]
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Connect the child's stdin to ours instead of the null device.
    #[must_use]
    pub fn allow_stdin(mut self, allow: bool) -> Self {
        self.allow_stdin = allow;
        self
    }

    /// The full argv, program first.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.command[0]
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.command[1..]
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.working_directory
    }

    #[must_use]
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    #[must_use]
    pub fn stdin_allowed(&self) -> bool {
        self.allow_stdin
    }

    /// The `PATH` value of the invocation's environment, if any.
    ///
    /// On Windows the variable name is matched case-insensitively, as the
    /// platform does.
    #[must_use]
    pub fn search_path(&self) -> Option<&str> {
        if let Some(path) = self.environment.get("PATH") {
            return Some(path);
        }
        if cfg!(windows) {
            return self
                .environment
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("PATH"))
                .map(|(_, value)| value.as_str());
        }
        None
    }

    /// Resolve the program against [`search_path`](Self::search_path).
    ///
    /// Programs containing a path separator are resolved relative to the
    /// working directory. Returns `None` when nothing executable is found;
    /// the caller's own `PATH` is never consulted.
    #[must_use]
    pub fn resolve_program(&self) -> Option<PathBuf> {
        which::which_in(self.program(), self.search_path(), &self.working_directory).ok()
    }

    /// Build a `std::process::Command` for `program` with this invocation's
    /// arguments, directory, environment and stdin policy.
    ///
    /// Output streams are left unconfigured; the caller decides how to pipe them.
    pub(crate) fn to_command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(self.args())
            .current_dir(&self.working_directory)
            .env_clear()
            .envs(&self.environment)
            .stdin(if self.allow_stdin {
                Stdio::inherit()
            } else {
                Stdio::null()
            });
        cmd
    }
}
