//! Command-line front end
//!
//! `cmdrun [OPTIONS] -- PROGRAM [ARGS...]` runs one program under supervision.
//! By default the caller's environment is forwarded explicitly and output is
//! only shown if the program fails; `--echo` streams it live instead. Ctrl+C
//! stops the program by escalation and exits with 130.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cmdrun_config::RunnerConfig;
use cmdrun_runner::{ExecError, InterruptFlag, Invocation, LocalProcessRunner, Runner};
use cmdrun_utils::error::UserFriendlyError;
use cmdrun_utils::exit_codes::ExitCode;
use cmdrun_utils::logging::init_tracing;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "cmdrun", version, about = "Run a command with live output capture and graceful interruption")]
pub struct Cli {
    /// Runner configuration file (TOML with a [runner] table)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stream the program's output while it runs
    #[arg(long)]
    pub echo: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Working directory of the program
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable for the program (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Start the program with only the --env variables
    #[arg(long)]
    pub clean_env: bool,

    /// Connect the program's stdin to ours
    #[arg(long)]
    pub stdin: bool,

    /// Program and arguments
    #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Parse arguments, run the program, and report.
///
/// Returns the exit code the process should use on anything but success.
pub fn run() -> Result<(), ExitCode> {
    execute(Cli::parse())
}

pub fn execute(cli: Cli) -> Result<(), ExitCode> {
    // A subscriber may already be installed by an embedding process.
    let _ = init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => match RunnerConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}", err.display_for_user());
                return Err(ExitCode::FAILURE);
            }
        },
        None => RunnerConfig::default(),
    };

    let invocation = match build_invocation(&cli) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return Err(ExitCode::FAILURE);
        }
    };

    let mut runner = LocalProcessRunner::with_config(config);
    match InterruptFlag::install_ctrlc() {
        Ok(flag) => runner = runner.with_interrupt(flag),
        Err(err) => warn!(error = %err, "Ctrl+C handling unavailable"),
    }

    match runner.run(invocation, cli.echo) {
        Ok(outcome) => outcome.assert_success().map_err(|err| {
            eprintln!("{}", err.display_for_user());
            err.to_exit_code()
        }),
        Err(err) => {
            if let ExecError::Cancelled { partial } = &err {
                // Shows captured output once unless it was echoed live.
                let _ = partial.assert_success();
            }
            eprintln!("{}", err.display_for_user());
            Err(err.to_exit_code())
        }
    }
}

fn build_invocation(cli: &Cli) -> Result<Invocation> {
    let mut invocation = Invocation::new(cli.command.iter().cloned())
        .context("No command given")?
        .allow_stdin(cli.stdin);

    if !cli.clean_env {
        // Variables that are not valid UTF-8 are skipped.
        invocation = invocation.envs(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }));
    }
    invocation = invocation.envs(cli.env.iter().cloned());

    let cwd = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    Ok(invocation.working_directory(cwd))
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        assert_eq!(
            parse_env("RUST_LOG=debug").unwrap(),
            ("RUST_LOG".to_string(), "debug".to_string())
        );
        assert_eq!(parse_env("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
        assert_eq!(parse_env("A=b=c").unwrap().1, "b=c");
        assert!(parse_env("=value").is_err());
        assert!(parse_env("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_trailing_command() {
        let cli = Cli::try_parse_from([
            "cmdrun", "--echo", "--env", "A=1", "--", "git", "log", "--oneline",
        ])
        .unwrap();

        assert!(cli.echo);
        assert_eq!(cli.env, vec![("A".to_string(), "1".to_string())]);
        assert_eq!(cli.command, ["git", "log", "--oneline"]);
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["cmdrun", "--echo"]).is_err());
    }

    #[test]
    fn test_clean_env_keeps_only_explicit_vars() {
        let cli = Cli::try_parse_from([
            "cmdrun", "--clean-env", "--env", "ONLY=1", "-C", "/tmp", "--", "env",
        ])
        .unwrap();
        let invocation = build_invocation(&cli).unwrap();

        assert_eq!(invocation.environment().len(), 1);
        assert_eq!(invocation.environment()["ONLY"], "1");
        assert_eq!(invocation.cwd(), std::path::Path::new("/tmp"));
    }

    #[test]
    fn test_forwarded_env_is_overridden_by_flags() {
        let cli = Cli::try_parse_from(["cmdrun", "--env", "PATH=/custom", "--", "env"]).unwrap();
        let invocation = build_invocation(&cli).unwrap();

        assert_eq!(invocation.search_path(), Some("/custom"));
    }
}
