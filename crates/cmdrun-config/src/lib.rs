//! Runner configuration for cmdrun
//!
//! Timing and I/O knobs for process supervision. Values can be built in code,
//! taken from [`RunnerConfig::default()`], or parsed from the `[runner]` table of
//! a TOML document:
//!
//! ```toml
//! [runner]
//! interrupt_timeout_ms = 300
//! terminate_timeout_ms = 200
//! poll_interval_ms = 50
//! drain_poll_interval_ms = 10
//! read_chunk_size = 4096
//! ```
//!
//! Locating the file is the calling tool's job; this crate only parses it.

use cmdrun_utils::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Grace period after the interrupt signal before escalating to terminate
pub const DEFAULT_INTERRUPT_TIMEOUT_MS: u64 = 300;

/// Grace period after the terminate signal before escalating to kill
pub const DEFAULT_TERMINATE_TIMEOUT_MS: u64 = 200;

/// How often the controlling thread checks child liveness and cancellation
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// How long a drainer waits for readiness before re-checking its stop flag
pub const DEFAULT_DRAIN_POLL_INTERVAL_MS: u64 = 10;

/// Upper bound for a single read from a child pipe
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Grace periods above this are rejected by [`RunnerConfig::validate`].
const MAX_GRACE_PERIOD_MS: u64 = 60_000;

/// Timing and buffer settings for supervising one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Wait after SIGINT (or CTRL_BREAK) before sending the terminate signal
    pub interrupt_timeout_ms: u64,
    /// Wait after the terminate signal before killing the child
    pub terminate_timeout_ms: u64,
    /// Liveness poll interval of the controlling thread
    pub poll_interval_ms: u64,
    /// Readiness wait of each drainer worker
    pub drain_poll_interval_ms: u64,
    /// Maximum bytes read from a pipe per readiness event
    pub read_chunk_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interrupt_timeout_ms: DEFAULT_INTERRUPT_TIMEOUT_MS,
            terminate_timeout_ms: DEFAULT_TERMINATE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            drain_poll_interval_ms: DEFAULT_DRAIN_POLL_INTERVAL_MS,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    runner: RunnerConfig,
}

impl RunnerConfig {
    /// Parse the `[runner]` table of a TOML document and validate it.
    ///
    /// A document without a `[runner]` table yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFile(e.to_string()))?;
        file.runner.validate()?;
        Ok(file.runner)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("drain_poll_interval_ms", self.drain_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "must be greater than 0".to_string(),
                });
            }
        }

        if self.read_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "read_chunk_size".to_string(),
                value: "must be greater than 0".to_string(),
            });
        }

        for (key, value) in [
            ("interrupt_timeout_ms", self.interrupt_timeout_ms),
            ("terminate_timeout_ms", self.terminate_timeout_ms),
        ] {
            if value > MAX_GRACE_PERIOD_MS {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: format!("{value} exceeds maximum limit of {MAX_GRACE_PERIOD_MS}"),
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub const fn interrupt_timeout(&self) -> Duration {
        Duration::from_millis(self.interrupt_timeout_ms)
    }

    #[must_use]
    pub const fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    /// Worst-case time from the interrupt signal to the kill signal.
    #[must_use]
    pub const fn escalation_budget(&self) -> Duration {
        Duration::from_millis(self.interrupt_timeout_ms + self.terminate_timeout_ms)
    }
}
