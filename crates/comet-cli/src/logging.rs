//! Log output for the `comet` binary. Events go to stderr so stdout carries
//! only JSON.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "COMET_LOG";

const DEFAULT_FILTER: &str = "comet=info";

static INIT_ONCE: Once = Once::new();

pub fn init() {
    INIT_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    });
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
