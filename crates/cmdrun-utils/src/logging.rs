//! Logging setup for cmdrun
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the calling tool. [`init_tracing`] is the stock setup used by the stub binary
//! and by embedders that have no logging of their own.

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default filter when `RUST_LOG` is unset and verbose output is requested.
const VERBOSE_FILTER: &str = "cmdrun=debug,cmdrun_runner=debug,cmdrun_config=debug,info";

/// Default filter otherwise.
const QUIET_FILTER: &str = "cmdrun=info,cmdrun_runner=info,warn";

/// Initialize a tracing subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the built-in filters. Verbose mode adds
/// targets and span close events (which carry the run duration).
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if verbose { VERBOSE_FILTER } else { QUIET_FILTER }))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(verbose)
        .with_line_number(false)
        .with_file(false)
        .with_span_events(if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE })
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()?;

    Ok(())
}

/// Span covering one supervised run.
pub fn run_span(program: &str, cwd: &std::path::Path) -> tracing::Span {
    span!(
        Level::DEBUG,
        "run",
        program = %program,
        cwd = %cwd.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_parse() {
        assert!(EnvFilter::try_new(VERBOSE_FILTER).is_ok());
        assert!(EnvFilter::try_new(QUIET_FILTER).is_ok());
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }

    #[test]
    fn test_run_span_can_be_entered() {
        let span = run_span("echo", std::path::Path::new("/tmp"));
        let _entered = span.enter();
    }
}
