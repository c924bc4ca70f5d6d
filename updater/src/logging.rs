//! Diagnostic tracing for the updater CLI.
//!
//! Status reports and cron outcomes are printed on stdout by the commands
//! themselves; tracing output goes to stderr and is controlled by
//! `RUST_LOG` (default `warn`), e.g. `RUST_LOG=updater=debug updater cron`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: env filter, compact formatter on stderr.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
