//! Per-stream output capture with optional live echo
//!
//! An [`OutputCapture`] always keeps every byte it is handed and, when echo is
//! enabled, also copies it to the real console stream. Finalization is tied to
//! ownership: [`finish`](OutputCapture::finish) freezes the buffer, and
//! dropping the capture on any other path (cancellation, panic) still flushes
//! the console.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::handler::BoxedHandler;
use crate::types::Stream;

#[derive(Debug)]
pub struct OutputCapture {
    stream: Stream,
    echo: bool,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl OutputCapture {
    #[must_use]
    pub fn new(stream: Stream, echo: bool) -> Self {
        Self {
            stream,
            echo,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn echoes(&self) -> bool {
        self.echo
    }

    /// A handler that appends to this capture (and echoes, if enabled).
    ///
    /// The buffer is appended to before the echo is attempted, so a failing
    /// console never loses captured bytes.
    #[must_use]
    pub fn handler(&self) -> BoxedHandler {
        let buffer = Arc::clone(&self.buffer);
        let stream = self.stream;
        let echo = self.echo;
        Box::new(move |chunk: &[u8]| -> io::Result<()> {
            buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(chunk);
            if echo {
                write_console(stream, chunk)?;
            }
            Ok(())
        })
    }

    /// Bytes captured so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Freeze the capture and return the bytes exactly as the child wrote them.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        if self.echo {
            let _ = flush_console(self.stream);
        }
    }
}

fn write_console(stream: Stream, chunk: &[u8]) -> io::Result<()> {
    match stream {
        Stream::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(chunk)?;
            out.flush()
        }
        Stream::Stderr => io::stderr().lock().write_all(chunk),
    }
}

fn flush_console(stream: Stream) -> io::Result<()> {
    match stream {
        Stream::Stdout => io::stdout().flush(),
        Stream::Stderr => io::stderr().flush(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_in_order() {
        let capture = OutputCapture::new(Stream::Stdout, false);
        let mut handler = capture.handler();

        handler.handle(b"one\n").unwrap();
        handler.handle(b"two\n").unwrap();

        assert_eq!(capture.snapshot(), b"one\ntwo\n");
        assert_eq!(capture.finish(), b"one\ntwo\n");
    }

    #[test]
    fn test_capture_outlives_handler() {
        let capture = OutputCapture::new(Stream::Stderr, false);
        {
            let mut handler = capture.handler();
            handler.handle(b"warning: x\n").unwrap();
        }
        assert_eq!(capture.finish(), b"warning: x\n");
    }

    #[test]
    fn test_capture_keeps_invalid_utf8_verbatim() {
        let capture = OutputCapture::new(Stream::Stdout, false);
        capture.handler().handle(&[0x66, 0xff, 0x6f]).unwrap();
        assert_eq!(capture.finish(), [0x66, 0xff, 0x6f]);
    }

    #[test]
    fn test_empty_capture_is_empty() {
        let capture = OutputCapture::new(Stream::Stdout, true);
        assert!(capture.echoes());
        assert!(capture.finish().is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_capture_is_concatenation(chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..16)) {
                let capture = OutputCapture::new(Stream::Stdout, false);
                let mut handler = capture.handler();
                for chunk in &chunks {
                    handler.handle(chunk).unwrap();
                }
                prop_assert_eq!(capture.snapshot(), chunks.concat());
            }
        }
    }
}
