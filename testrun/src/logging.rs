//! Diagnostic tracing for the test runner.
//!
//! Diagnostics go to stderr so they never interleave with the test report on
//! stdout (or the report copy written with `--log-file`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn`, or `testrun=debug` with `verbose`.
///
/// # Example
/// ```bash
/// RUST_LOG=testrun=debug testrun run
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,testrun=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
