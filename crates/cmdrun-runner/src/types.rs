//! Small value types shared by the runner modules

/// One of the two captured output streams of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a [`StreamDrainer`](crate::drainer::StreamDrainer).
///
/// States only move forward: `Created -> Running -> StopRequested -> Drained`.
/// `Running` may be skipped when a stop is requested before the worker starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DrainerState {
    /// Worker thread spawned but not yet polling
    Created = 0,
    /// Forwarding bytes as they become readable
    Running = 1,
    /// Stop flag set; worker is reading the remainder up to end-of-stream
    StopRequested = 2,
    /// End-of-stream reached and worker joined
    Drained = 3,
}

impl DrainerState {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::StopRequested,
            _ => Self::Drained,
        }
    }
}

/// How [`ProcessHandle::run`](crate::handle::ProcessHandle::run) returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The child finished on its own (or never started) with this exit code.
    /// Both streams are fully drained.
    Exited(i32),
    /// Cancellation was observed while the child was running. The child and
    /// its drainers are left in place for
    /// [`ProcessHandle::interrupt`](crate::handle::ProcessHandle::interrupt).
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(Stream::Stdout.as_str(), "stdout");
        assert_eq!(Stream::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_drainer_state_from_u8() {
        for state in [
            DrainerState::Created,
            DrainerState::Running,
            DrainerState::StopRequested,
            DrainerState::Drained,
        ] {
            assert_eq!(DrainerState::from_u8(state as u8), state);
        }
        assert_eq!(DrainerState::from_u8(200), DrainerState::Drained);
    }

    #[test]
    fn test_drainer_states_are_ordered() {
        assert!(DrainerState::Created < DrainerState::Running);
        assert!(DrainerState::Running < DrainerState::StopRequested);
        assert!(DrainerState::StopRequested < DrainerState::Drained);
    }
}
