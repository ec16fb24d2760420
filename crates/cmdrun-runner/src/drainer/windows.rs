//! Readiness via `PeekNamedPipe`, since anonymous pipes cannot be waited on.

use std::io::{self, Read};
use std::os::windows::io::AsRawHandle;
use std::thread;

use tracing::debug;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Pipes::PeekNamedPipe;

use super::{Control, DrainSettings, read_until_eof};
use crate::handler::Sink;

/// A readable pipe end a drainer can own.
pub trait PipeSource: Read + AsRawHandle + Send + 'static {}

impl<T: Read + AsRawHandle + Send + 'static> PipeSource for T {}

pub(super) fn pump<R: PipeSource>(
    mut pipe: R,
    sink: &mut Sink,
    control: &Control,
    settings: DrainSettings,
) {
    let mut buf = vec![0u8; settings.read_chunk_size];

    while !control.stop_requested() {
        let available = match bytes_available(&pipe) {
            Ok(0) => {
                thread::sleep(settings.poll_interval);
                continue;
            }
            Ok(n) => n,
            // Broken pipe: the writer is gone, so the final drain hits EOF.
            Err(_) => break,
        };

        let len = available.min(buf.len());
        match pipe.read(&mut buf[..len]) {
            Ok(0) => return,
            Ok(n) => sink.deliver(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return,
            Err(err) => {
                debug!(error = %err, "Pipe read failed");
                return;
            }
        }
    }

    read_until_eof(&mut pipe, &mut buf, sink);
}

fn bytes_available(pipe: &impl AsRawHandle) -> windows::core::Result<usize> {
    let mut available: u32 = 0;
    // SAFETY: the handle is owned by `pipe` and stays open for the call; only
    // the available-byte count is written.
    unsafe {
        PeekNamedPipe(
            HANDLE(pipe.as_raw_handle()),
            None,
            0,
            None,
            Some(&raw mut available),
            None,
        )?;
    }
    Ok(available as usize)
}
