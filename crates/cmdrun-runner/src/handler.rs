//! Output handler contract
//!
//! A handler receives raw chunks of one output stream in the order the OS
//! produced them. Handlers are allowed to fail: an `Err` or a panic is logged at
//! debug level and delivery simply continues with the next chunk, so a broken
//! consumer can never take down process supervision.

use std::io;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::types::Stream;

/// Consumer of one output stream.
///
/// Implemented for every `FnMut(&[u8]) -> io::Result<()> + Send` closure.
pub trait OutputHandler: Send {
    fn handle(&mut self, chunk: &[u8]) -> io::Result<()>;
}

impl<F> OutputHandler for F
where
    F: FnMut(&[u8]) -> io::Result<()> + Send,
{
    fn handle(&mut self, chunk: &[u8]) -> io::Result<()> {
        self(chunk)
    }
}

/// Owned handler as moved into a drainer worker.
pub type BoxedHandler = Box<dyn OutputHandler + 'static>;

/// A handler that discards everything.
#[must_use]
pub fn discard() -> BoxedHandler {
    Box::new(|_: &[u8]| -> io::Result<()> { Ok(()) })
}

/// Handler bound to its stream name, delivering with failure isolation.
pub(crate) struct Sink {
    stream: Stream,
    handler: BoxedHandler,
}

impl Sink {
    pub(crate) fn new(stream: Stream, handler: BoxedHandler) -> Self {
        Self { stream, handler }
    }

    pub(crate) fn deliver(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let handler = &mut self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(chunk))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(stream = %self.stream, error = %err, "Output handler failed; chunk dropped");
            }
            Err(_) => {
                debug!(stream = %self.stream, "Output handler panicked; chunk dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_is_a_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let mut sink = Sink::new(
            Stream::Stdout,
            Box::new(move |chunk: &[u8]| -> io::Result<()> {
                sink_seen.lock().unwrap().extend_from_slice(chunk);
                Ok(())
            }),
        );

        sink.deliver(b"hello ");
        sink.deliver(b"");
        sink.deliver(b"world");

        assert_eq!(*seen.lock().unwrap(), b"hello world");
    }

    #[test]
    fn test_failing_handler_is_swallowed() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut sink = Sink::new(
            Stream::Stderr,
            Box::new(move |_: &[u8]| -> io::Result<()> {
                *counter.lock().unwrap() += 1;
                Err(io::Error::other("consumer gone"))
            }),
        );

        sink.deliver(b"a");
        sink.deliver(b"b");

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_panicking_handler_is_swallowed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let mut sink = Sink::new(
            Stream::Stdout,
            Box::new(move |chunk: &[u8]| -> io::Result<()> {
                if chunk == b"bad" {
                    panic!("handler bug");
                }
                sink_seen.lock().unwrap().extend_from_slice(chunk);
                Ok(())
            }),
        );

        sink.deliver(b"bad");
        sink.deliver(b"good");

        assert_eq!(*seen.lock().unwrap(), b"good");
    }

    #[test]
    fn test_discard_accepts_everything() {
        let mut handler = discard();
        assert!(handler.handle(b"anything").is_ok());
    }
}
