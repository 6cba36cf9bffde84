use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Env var read for the log filter, e.g. `DEVTOOL_LOG=devtool_assistant=trace`.
pub const LOG_ENV: &str = "DEVTOOL_LOG";

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("devtool_assistant=debug,warn")
    } else {
        EnvFilter::new("warn")
    }
}

/// Install the stderr subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| default_filter(verbose));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        debug!("Logging initialized");
    }
}
