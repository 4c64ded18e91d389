//! Structured logging for the service binary.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,live_analytics=debug";

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_JSON=1` (or `true`)
/// switches to JSON lines for log shippers.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::debug!("logging initialized");
}

fn json_logs() -> bool {
    std::env::var("LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
