//! Cancellation sources observed by the controlling thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Polled by [`ProcessHandle::run`](crate::ProcessHandle::run) once per poll
/// interval; returning `true` starts interrupt escalation.
pub trait InterruptChecker: Send + Sync {
    fn is_interrupted(&self) -> bool;
}

/// Never reports an interrupt. The default for runners.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupted;

impl InterruptChecker for NeverInterrupted {
    fn is_interrupted(&self) -> bool {
        false
    }
}

/// A cloneable flag; any clone can trigger it.
///
/// ```rust
/// use cmdrun_runner::{InterruptChecker, InterruptFlag};
///
/// let flag = InterruptFlag::new();
/// let trigger = flag.clone();
/// assert!(!flag.is_interrupted());
/// trigger.trigger();
/// assert!(flag.is_interrupted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    flag: Arc<AtomicBool>,
}

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag set by Ctrl+C (SIGINT on Unix, console Ctrl+C/Ctrl+Break on
    /// Windows).
    ///
    /// # Errors
    ///
    /// Fails if a Ctrl+C handler is already installed in this process.
    pub fn install_ctrlc() -> Result<Self, ctrlc::Error> {
        let flag = Self::new();
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || {
            debug!("Ctrl+C received");
            handler_flag.trigger();
        })?;
        Ok(flag)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the next run starts uninterrupted.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl InterruptChecker for InterruptFlag {
    fn is_interrupted(&self) -> bool {
        self.is_set()
    }
}

impl<T: InterruptChecker + ?Sized> InterruptChecker for Arc<T> {
    fn is_interrupted(&self) -> bool {
        (**self).is_interrupted()
    }
}
