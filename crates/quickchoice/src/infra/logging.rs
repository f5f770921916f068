//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "QUICKCHOICE_LOG";

/// Install the global fmt subscriber, filtered by `QUICKCHOICE_LOG` (default `info`).
///
/// Output goes to stderr so command output on stdout stays machine-readable.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
