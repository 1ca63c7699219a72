//! `tracing` subscriber setup
//!
//! Log lines go to stderr so that `--output json` keeps stdout machine
//! readable. `RUST_LOG` overrides the verbosity-derived default, e.g.
//! `RUST_LOG=catalog_import=debug`.

use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::VerbosityLevel;

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(verbosity >= VerbosityLevel::Debug)
        .try_init();
}

/// Debug-level subscriber writing through the test harness
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
