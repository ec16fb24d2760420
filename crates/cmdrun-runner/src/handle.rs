use std::io;
use std::process::{Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cmdrun_config::RunnerConfig;
use cmdrun_utils::exit_codes::ExitCode;
use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use crate::drainer::{DrainSettings, StreamDrainer};
use crate::handler::BoxedHandler;
use crate::interrupt::InterruptChecker;
use crate::invocation::Invocation;
use crate::platform;
use crate::types::{RunStatus, Stream};

// ============================================================================
// ProcessHandle - one supervised child, start to finish
// ============================================================================

/// Supervision of exactly one child process.
///
/// A handle is created by a [`Runner`](crate::Runner) for one run and never
/// reused. `run` and `interrupt` must be called from the same (controlling)
/// thread.
pub trait ProcessHandle {
    /// The command as it will be (or was) executed, with the program resolved
    /// against the invocation's own `PATH`. Resolution happens at most once.
    fn resolved_command(&self) -> &[String];

    /// Start the child and supervise it until it exits or `interrupt` reports
    /// cancellation.
    ///
    /// On [`RunStatus::Exited`] both streams have been fully delivered to the
    /// handlers. On [`RunStatus::Interrupted`] the child is still running and
    /// the caller is expected to call [`interrupt`](Self::interrupt).
    ///
    /// The final drain waits for end-of-file on both pipes and does not poll
    /// `interrupt`. A background grandchild that inherited a pipe therefore
    /// keeps this call blocked until it exits or closes the pipe.
    fn run(
        &mut self,
        stdout: BoxedHandler,
        stderr: BoxedHandler,
        interrupt: &dyn InterruptChecker,
    ) -> RunStatus;

    /// Stop the child by escalation and return its exit code.
    ///
    /// Both drainers are finished when this returns, whatever stage ended the
    /// child. If the child has already exited only the final drain runs.
    fn interrupt(&mut self) -> i32;

    /// The exit code once the child has finished and been drained.
    fn exit_code(&self) -> Option<i32>;
}

/// [`ProcessHandle`] for a child process on the local machine.
pub struct LocalProcessHandle {
    invocation: Arc<Invocation>,
    config: RunnerConfig,
    resolved: OnceCell<Vec<String>>,
    child: Option<Child>,
    stdout: Option<StreamDrainer>,
    stderr: Option<StreamDrainer>,
    exit_code: Option<i32>,
}

impl LocalProcessHandle {
    #[must_use]
    pub fn new(invocation: Arc<Invocation>, config: RunnerConfig) -> Self {
        Self {
            invocation,
            config,
            resolved: OnceCell::new(),
            child: None,
            stdout: None,
            stderr: None,
            exit_code: None,
        }
    }

    #[must_use]
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// OS process id of the child, once spawned.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn spawn(&mut self, stdout: BoxedHandler, stderr: BoxedHandler) -> io::Result<()> {
        let program = self.resolved_command()[0].clone();
        let mut cmd = self.invocation.to_command(&program);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        platform::configure_command(&mut cmd);

        let mut child = cmd.spawn()?;
        debug!(pid = child.id(), program = %program, "Spawned child");

        let settings = DrainSettings::from_config(&self.config);
        let pipes = child.stdout.take().zip(child.stderr.take());
        let drainers = pipes
            .ok_or_else(|| io::Error::other("child pipes were not captured"))
            .and_then(|(out, err)| {
                let out = StreamDrainer::spawn(Stream::Stdout, out, stdout, settings)?;
                let err = StreamDrainer::spawn(Stream::Stderr, err, stderr, settings)?;
                Ok((out, err))
            });

        match drainers {
            Ok((out, err)) => {
                self.child = Some(child);
                self.stdout = Some(out);
                self.stderr = Some(err);
                Ok(())
            }
            Err(err) => {
                // A started drainer only finishes once the child is gone.
                let _ = child.kill();
                let _ = child.wait();
                Err(err)
            }
        }
    }

    /// Drain both streams and record the exit code.
    fn settle(&mut self, status: io::Result<ExitStatus>) -> i32 {
        let code = match status {
            Ok(status) => platform::exit_code(status),
            Err(err) => {
                warn!(error = %err, "Lost track of child; killing it");
                if let Some(child) = self.child.as_mut() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                ExitCode::FAILURE.as_i32()
            }
        };

        for drainer in [self.stdout.as_mut(), self.stderr.as_mut()]
            .into_iter()
            .flatten()
        {
            drainer.drain();
        }

        self.exit_code = Some(code);
        code
    }

    fn escalate(&self, child: &mut Child) -> io::Result<ExitStatus> {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let poll = self.config.drain_poll_interval();

        debug!(pid = child.id(), "Sending interrupt");
        if let Err(err) = platform::send_interrupt(child) {
            debug!(error = %err, "Interrupt could not be delivered");
        }
        if let Some(status) = wait_for_exit(child, self.config.interrupt_timeout(), poll)? {
            return Ok(status);
        }

        debug!(pid = child.id(), "Child still running; terminating");
        if let Err(err) = platform::send_terminate(child) {
            debug!(error = %err, "Terminate could not be delivered");
        }
        if let Some(status) = wait_for_exit(child, self.config.terminate_timeout(), poll)? {
            return Ok(status);
        }

        warn!(pid = child.id(), "Child ignored interrupt and terminate; killing");
        child.kill()?;
        child.wait()
    }
}

impl ProcessHandle for LocalProcessHandle {
    fn resolved_command(&self) -> &[String] {
        self.resolved.get_or_init(|| resolve(&self.invocation))
    }

    fn run(
        &mut self,
        stdout: BoxedHandler,
        stderr: BoxedHandler,
        interrupt: &dyn InterruptChecker,
    ) -> RunStatus {
        if let Some(code) = self.exit_code {
            return RunStatus::Exited(code);
        }

        if self.child.is_none() {
            if let Err(err) = self.spawn(stdout, stderr) {
                let code = ExitCode::from_spawn_error(&err).as_i32();
                debug!(
                    command = ?self.resolved_command(),
                    error = %err,
                    exit_code = code,
                    "Failed to start child"
                );
                self.exit_code = Some(code);
                return RunStatus::Exited(code);
            }
        }

        let poll = self.config.poll_interval();
        loop {
            let polled = match self.child.as_mut() {
                Some(child) => child.try_wait(),
                None => return RunStatus::Exited(ExitCode::FAILURE.as_i32()),
            };
            match polled {
                Ok(Some(status)) => return RunStatus::Exited(self.settle(Ok(status))),
                Ok(None) => {}
                Err(err) => return RunStatus::Exited(self.settle(Err(err))),
            }

            if interrupt.is_interrupted() {
                debug!("Cancellation observed");
                return RunStatus::Interrupted;
            }
            thread::sleep(poll);
        }
    }

    fn interrupt(&mut self) -> i32 {
        if let Some(code) = self.exit_code {
            return code;
        }
        let Some(mut child) = self.child.take() else {
            // Cancelled before anything was started.
            let code = ExitCode::INTERRUPTED.as_i32();
            self.exit_code = Some(code);
            return code;
        };

        let status = self.escalate(&mut child);
        self.child = Some(child);
        let code = self.settle(status);
        debug!(exit_code = code, "Escalation finished");
        code
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        if self.exit_code.is_some() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                debug!(pid = child.id(), "Handle dropped with live child; killing");
                let _ = child.kill();
            }
            let _ = child.wait();
        }
        // Drainers drop after this and join on their now-closed pipes.
    }
}

impl std::fmt::Debug for LocalProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProcessHandle")
            .field("command", &self.invocation.command())
            .field("pid", &self.id())
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}

/// Resolve the program, falling back to the command as given.
fn resolve(invocation: &Invocation) -> Vec<String> {
    let mut command = invocation.command().to_vec();
    match invocation.resolve_program() {
        Some(path) => match path.into_os_string().into_string() {
            Ok(path) => {
                debug!(program = %invocation.program(), resolved = %path, "Resolved program");
                command[0] = path;
            }
            Err(path) => {
                debug!(resolved = ?path, "Resolved path is not UTF-8; using program as given");
            }
        },
        None => {
            debug!(program = %invocation.program(), "Program not found on invocation PATH");
        }
    }
    command
}

/// Poll until the child exits or `timeout` elapses.
fn wait_for_exit(
    child: &mut Child,
    timeout: Duration,
    poll: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(poll.min(deadline - now));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::handler::discard;
    use crate::interrupt::{InterruptFlag, NeverInterrupted};
    use std::sync::Mutex;

    fn host_path() -> String {
        std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string())
    }

    fn handle(command: &[&str]) -> LocalProcessHandle {
        let invocation = Invocation::new(command.iter().copied())
            .unwrap()
            .env("PATH", host_path());
        LocalProcessHandle::new(Arc::new(invocation), RunnerConfig::default())
    }

    fn collecting() -> (Arc<Mutex<Vec<u8>>>, BoxedHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler_seen = Arc::clone(&seen);
        let handler: BoxedHandler = Box::new(move |chunk: &[u8]| -> io::Result<()> {
            handler_seen.lock().unwrap().extend_from_slice(chunk);
            Ok(())
        });
        (seen, handler)
    }

    #[test]
    fn test_run_to_completion() {
        let mut handle = handle(&["sh", "-c", "printf out; printf err >&2; exit 3"]);
        let (out, out_handler) = collecting();
        let (err, err_handler) = collecting();

        let status = handle.run(out_handler, err_handler, &NeverInterrupted);

        assert_eq!(status, RunStatus::Exited(3));
        assert_eq!(handle.exit_code(), Some(3));
        assert_eq!(*out.lock().unwrap(), b"out");
        assert_eq!(*err.lock().unwrap(), b"err");
    }

    #[test]
    fn test_failing_handlers_do_not_disturb_the_run() {
        let mut handle = handle(&["sh", "-c", "echo one; echo two; echo oops >&2"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler_seen = Arc::clone(&seen);
        let failing: BoxedHandler = Box::new(move |chunk: &[u8]| -> io::Result<()> {
            handler_seen.lock().unwrap().extend_from_slice(chunk);
            Err(io::Error::other("consumer gone"))
        });
        let panicking: BoxedHandler = Box::new(|_: &[u8]| -> io::Result<()> {
            panic!("consumer crashed");
        });

        let status = handle.run(failing, panicking, &NeverInterrupted);

        assert_eq!(status, RunStatus::Exited(0));
        assert_eq!(*seen.lock().unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn test_stdin_is_closed_unless_allowed() {
        let mut handle = handle(&["sh", "-c", "cat; echo end"]);
        assert!(!handle.invocation().stdin_allowed());
        let (out, out_handler) = collecting();

        // Bounds the run if stdin were ever left connected.
        let flag = InterruptFlag::new();
        let trigger = flag.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(10));
            trigger.trigger();
        });
        let started = Instant::now();
        let status = handle.run(out_handler, discard(), &flag);

        assert_eq!(status, RunStatus::Exited(0));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(*out.lock().unwrap(), b"end\n");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let handle = handle(&["sh", "-c", "true"]);
        let first = handle.resolved_command().to_vec();
        let second = handle.resolved_command().to_vec();

        assert_eq!(first, second);
        assert!(first[0].starts_with('/'), "expected absolute path, got {}", first[0]);
        assert_eq!(&first[1..], ["-c", "true"]);
    }

    #[test]
    fn test_unresolvable_program_falls_back_and_reports_127() {
        let mut handle = handle(&["cmdrun-does-not-exist", "--flag"]);
        assert_eq!(handle.resolved_command(), ["cmdrun-does-not-exist", "--flag"]);

        let status = handle.run(discard(), discard(), &NeverInterrupted);
        assert_eq!(status, RunStatus::Exited(127));
        assert_eq!(handle.id(), None);
    }

    #[test]
    fn test_environment_is_not_inherited() {
        // SAFETY: test-only; no other test reads this variable.
        unsafe { std::env::set_var("CMDRUN_HANDLE_TEST_LEAK", "leaked") };
        let mut handle = handle(&["sh", "-c", "printf \"[$CMDRUN_HANDLE_TEST_LEAK]\""]);
        let (out, out_handler) = collecting();

        handle.run(out_handler, discard(), &NeverInterrupted);

        assert_eq!(*out.lock().unwrap(), b"[]");
    }

    #[test]
    fn test_second_run_returns_stored_code() {
        let mut handle = handle(&["sh", "-c", "exit 4"]);
        assert_eq!(handle.run(discard(), discard(), &NeverInterrupted), RunStatus::Exited(4));
        assert_eq!(handle.run(discard(), discard(), &NeverInterrupted), RunStatus::Exited(4));
        assert_eq!(handle.interrupt(), 4);
    }

    #[test]
    fn test_interrupt_escalates_past_ignored_sigint() {
        let mut handle = handle(&["sh", "-c", "trap '' INT; echo ready; exec sleep 30"]);
        let flag = InterruptFlag::new();
        let trigger = flag.clone();
        let handler: BoxedHandler = Box::new(move |chunk: &[u8]| -> io::Result<()> {
            if chunk.windows(5).any(|w| w == b"ready") {
                trigger.trigger();
            }
            Ok(())
        });

        assert_eq!(handle.run(handler, discard(), &flag), RunStatus::Interrupted);
        let started = Instant::now();
        let code = handle.interrupt();
        let elapsed = started.elapsed();

        assert!(matches!(code, 143 | 137), "unexpected exit code {code}");
        assert!(elapsed < Duration::from_millis(300 + 200 + 1500), "took {elapsed:?}");
        assert_eq!(handle.exit_code(), Some(code));
    }

    #[test]
    fn test_interrupt_after_natural_exit_only_drains() {
        let mut handle = handle(&["sh", "-c", "echo done"]);
        let flag = InterruptFlag::new();
        flag.trigger();
        let (out, out_handler) = collecting();

        // The child may or may not have exited before the first check.
        if handle.run(out_handler, discard(), &flag) == RunStatus::Interrupted {
            thread::sleep(Duration::from_millis(200));
        }
        let code = handle.interrupt();

        assert_eq!(code, 0);
        assert_eq!(*out.lock().unwrap(), b"done\n");
    }

    #[test]
    fn test_interrupt_before_run() {
        let mut handle = handle(&["sh", "-c", "true"]);
        assert_eq!(handle.interrupt(), ExitCode::INTERRUPTED.as_i32());
    }

    #[test]
    fn test_drop_kills_live_child() {
        let mut handle = handle(&["sleep", "30"]);
        let flag = InterruptFlag::new();
        flag.trigger();

        assert_eq!(handle.run(discard(), discard(), &flag), RunStatus::Interrupted);
        let pid = nix::unistd::Pid::from_raw(i32::try_from(handle.id().unwrap()).unwrap());
        let started = Instant::now();
        drop(handle);

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(nix::sys::signal::kill(pid, None).is_err(), "child still alive");
    }
}
