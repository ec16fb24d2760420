//! Background draining of one child output stream.
//!
//! Each [`StreamDrainer`] owns one pipe and one worker thread. While running,
//! the worker waits for readiness with a short timeout and forwards every read
//! to its handler immediately, so consumers see output while the child is
//! still producing it. Once a stop is requested the worker keeps reading until
//! end-of-stream; [`StreamDrainer::drain`] returns only after that final read
//! and the join.
//!
//! The readiness primitive is platform specific and lives in the `unix` and
//! `windows` submodules.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cmdrun_config::RunnerConfig;
use tracing::{debug, trace};

use crate::handler::{BoxedHandler, Sink};
use crate::types::{DrainerState, Stream};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::PipeSource;
#[cfg(unix)]
use unix::pump;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::PipeSource;
#[cfg(windows)]
use windows::pump;

/// Read granularity and readiness timeout of a drainer worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    pub read_chunk_size: usize,
    pub poll_interval: Duration,
}

impl DrainSettings {
    #[must_use]
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            read_chunk_size: config.read_chunk_size.max(1),
            poll_interval: config.drain_poll_interval(),
        }
    }
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// Shared between the owner and the worker thread.
struct Control {
    stop: AtomicBool,
    state: AtomicU8,
}

impl Control {
    fn advance(&self, from: DrainerState, to: DrainerState) {
        let _ = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Blocking reads until end-of-stream. Used once a stop was requested, when
/// the writer is known to be gone or about to go.
fn read_until_eof<R: Read>(pipe: &mut R, buf: &mut [u8], sink: &mut Sink) {
    loop {
        match pipe.read(buf) {
            Ok(0) => return,
            Ok(n) => sink.deliver(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return,
            Err(err) => {
                debug!(error = %err, "Final drain read failed");
                return;
            }
        }
    }
}

/// One background reader bound to one output stream of a child.
///
/// Single use: after [`drain`](Self::drain) the drainer is finished for good.
/// Dropping an undrained drainer drains it, so the worker never outlives its
/// owner.
pub struct StreamDrainer {
    stream: Stream,
    control: Arc<Control>,
    worker: Option<JoinHandle<()>>,
}

impl StreamDrainer {
    /// Start a worker forwarding `pipe` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the worker thread cannot be created.
    pub fn spawn<R: PipeSource>(
        stream: Stream,
        pipe: R,
        handler: BoxedHandler,
        settings: DrainSettings,
    ) -> io::Result<Self> {
        let control = Arc::new(Control {
            stop: AtomicBool::new(false),
            state: AtomicU8::new(DrainerState::Created as u8),
        });

        let worker_control = Arc::clone(&control);
        let worker = thread::Builder::new()
            .name(format!("cmdrun-{stream}"))
            .spawn(move || {
                worker_control.advance(DrainerState::Created, DrainerState::Running);
                let mut sink = Sink::new(stream, handler);
                pump(pipe, &mut sink, &worker_control, settings);
                trace!(%stream, "Drainer reached end of stream");
            })?;

        Ok(Self {
            stream,
            control,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn stream(&self) -> Stream {
        self.stream
    }

    #[must_use]
    pub fn state(&self) -> DrainerState {
        DrainerState::from_u8(self.control.state.load(Ordering::Acquire))
    }

    /// Ask the worker to stop polling and read the rest of the stream.
    ///
    /// Does not wait; see [`drain`](Self::drain).
    pub fn request_stop(&self) {
        self.control.stop.store(true, Ordering::Release);
        self.control
            .advance(DrainerState::Created, DrainerState::StopRequested);
        self.control
            .advance(DrainerState::Running, DrainerState::StopRequested);
    }

    /// Stop the worker and block until every byte up to end-of-stream has been
    /// delivered and the worker has been joined.
    ///
    /// Only call this once the writing side is closed (the child has exited),
    /// otherwise it waits for the child to close the pipe. Idempotent.
    pub fn drain(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.request_stop();
        if worker.join().is_err() {
            debug!(stream = %self.stream, "Drainer worker panicked");
        }
        self.control
            .state
            .store(DrainerState::Drained as u8, Ordering::Release);
    }
}

impl Drop for StreamDrainer {
    fn drop(&mut self) {
        self.drain();
    }
}

impl std::fmt::Debug for StreamDrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDrainer")
            .field("stream", &self.stream)
            .field("state", &self.state())
            .finish()
    }
}
