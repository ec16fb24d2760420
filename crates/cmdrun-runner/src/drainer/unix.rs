//! Readiness via `poll(2)` on the pipe's file descriptor.

use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::debug;

use super::{Control, DrainSettings, read_until_eof};
use crate::handler::Sink;

/// A readable pipe end a drainer can own.
pub trait PipeSource: Read + AsFd + Send + 'static {}

impl<T: Read + AsFd + Send + 'static> PipeSource for T {}

pub(super) fn pump<R: PipeSource>(
    mut pipe: R,
    sink: &mut Sink,
    control: &Control,
    settings: DrainSettings,
) {
    let mut buf = vec![0u8; settings.read_chunk_size];
    let timeout = poll_timeout(settings.poll_interval);

    while !control.stop_requested() {
        match wait_readable(&pipe, timeout) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(errno) => {
                debug!(error = %errno, "poll failed; falling back to blocking reads");
                break;
            }
        }

        match pipe.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => sink.deliver(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                debug!(error = %err, "Pipe read failed");
                return;
            }
        }
    }

    read_until_eof(&mut pipe, &mut buf, sink);
}

/// `true` once a read will not block: data is available or the writer hung up.
fn wait_readable(pipe: &impl AsFd, timeout: PollTimeout) -> Result<bool, Errno> {
    let mut fds = [PollFd::new(pipe.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, timeout) {
        Ok(0) | Err(Errno::EINTR) => Ok(false),
        Ok(_) => Ok(true),
        Err(errno) => Err(errno),
    }
}

fn poll_timeout(interval: Duration) -> PollTimeout {
    let millis = u16::try_from(interval.as_millis()).unwrap_or(u16::MAX);
    PollTimeout::from(millis.max(1))
}
