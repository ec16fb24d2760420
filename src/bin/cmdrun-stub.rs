//! Scriptable child process for testing cmdrun
//!
//! This binary behaves like the programs cmdrun supervises in practice:
//! it writes to stdout and stderr, sleeps, produces bulk output, exits with a
//! chosen code and can ignore interrupt or terminate signals. Every action is
//! selected by flags so integration tests stay free of shell scripts.
//!
//! Order of actions: signal setup, `--ready`, `--stdout`, `--bytes`,
//! `--sleep-ms`, `--stderr`, exit.

use clap::{Arg, ArgAction, Command, value_parser};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("cmdrun-stub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scriptable child process for testing cmdrun")
        .arg(
            Arg::new("ready")
                .long("ready")
                .help("Print 'ready' on stdout once signal setup is done")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stdout")
                .long("stdout")
                .value_name("TEXT")
                .help("Text to write to stdout"),
        )
        .arg(
            Arg::new("bytes")
                .long("bytes")
                .value_name("N")
                .help("Write N bytes of 'x' to stdout")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("sleep-ms")
                .long("sleep-ms")
                .value_name("MS")
                .help("Sleep between stdout and stderr output")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("stderr")
                .long("stderr")
                .value_name("TEXT")
                .help("Text to write to stderr"),
        )
        .arg(
            Arg::new("exit-code")
                .long("exit-code")
                .value_name("CODE")
                .help("Exit code")
                .default_value("0")
                .value_parser(value_parser!(i32)),
        )
        .arg(
            Arg::new("ignore-interrupt")
                .long("ignore-interrupt")
                .help("Ignore SIGINT (Unix only)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ignore-terminate")
                .long("ignore-terminate")
                .help("Ignore SIGTERM (Unix only)")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    ignore_signals(
        matches.get_flag("ignore-interrupt"),
        matches.get_flag("ignore-terminate"),
    )?;

    let mut stdout = io::stdout().lock();
    if matches.get_flag("ready") {
        writeln!(stdout, "ready")?;
        stdout.flush()?;
    }
    if let Some(text) = matches.get_one::<String>("stdout") {
        writeln!(stdout, "{text}")?;
        stdout.flush()?;
    }
    if let Some(&count) = matches.get_one::<usize>("bytes") {
        let chunk = [b'x'; 8192];
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            stdout.write_all(&chunk[..n])?;
            remaining -= n;
        }
        stdout.flush()?;
    }
    drop(stdout);

    if let Some(&ms) = matches.get_one::<u64>("sleep-ms") {
        thread::sleep(Duration::from_millis(ms));
    }

    if let Some(text) = matches.get_one::<String>("stderr") {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{text}")?;
        stderr.flush()?;
    }

    let code = matches.get_one::<i32>("exit-code").copied().unwrap_or(0);
    std::process::exit(code);
}

#[cfg(unix)]
fn ignore_signals(interrupt: bool, terminate: bool) -> Result<(), Box<dyn std::error::Error>> {
    use nix::sys::signal::{SigHandler, Signal, signal};

    for (enabled, sig) in [(interrupt, Signal::SIGINT), (terminate, Signal::SIGTERM)] {
        if enabled {
            // SAFETY: installing SIG_IGN runs no code in signal context.
            unsafe { signal(sig, SigHandler::SigIgn) }?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn ignore_signals(_interrupt: bool, _terminate: bool) -> Result<(), Box<dyn std::error::Error>> {
    Ok(())
}
