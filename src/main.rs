//! Live Analytics Pipeline
//!
//! Real-time user analytics service handling:
//! - Activity tracking with session lifecycle management
//! - Resumable change-feed relay into a realtime fan-out hub
//! - Windowed aggregation served over REST and pushed over WebSocket

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use api::{router, AppState};
use change_relay::{ChangeFeedRelay, RelayConfig};
use event_store::MemoryStore;
use realtime_hub::{AuthKeys, Hub};
use stats_engine::StatsEngine;
use telemetry::{health, init_logging};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// HMAC secret for bearer-token verification
    #[serde(default = "default_jwt_secret")]
    jwt_secret: String,

    /// Lookback for pushed snapshots (minutes)
    #[serde(default = "default_window_minutes")]
    window_minutes: i64,
    /// Bucket width for pushed snapshots (minutes)
    #[serde(default = "default_interval_minutes")]
    interval_minutes: i64,
    /// Window for collapsing recompute triggers (ms)
    #[serde(default = "default_stats_debounce_ms")]
    stats_debounce_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_jwt_secret() -> String {
    "dev-secret-change-me".to_string()
}

fn default_window_minutes() -> i64 {
    60
}

fn default_interval_minutes() -> i64 {
    5
}

fn default_stats_debounce_ms() -> u64 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            jwt_secret: default_jwt_secret(),
            window_minutes: default_window_minutes(),
            interval_minutes: default_interval_minutes(),
            stats_debounce_ms: default_stats_debounce_ms(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    init_logging();

    info!("Starting Live Analytics v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    if config.jwt_secret == default_jwt_secret() {
        error!("Running with the default JWT secret; set ANALYTICS_JWT_SECRET");
    }

    // Storage backend and fan-out hub
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(Hub::new());
    let keys = Arc::new(AuthKeys::new(&config.jwt_secret));

    health().store.set_healthy();
    health().hub.set_healthy();

    // Change-feed relay: store inserts -> hub topics, debounced recomputes
    let relay = Arc::new(ChangeFeedRelay::new(
        store.clone(),
        hub.clone(),
        StatsEngine::new(store.clone()),
        RelayConfig {
            stats_debounce: Duration::from_millis(config.stats_debounce_ms),
            window_minutes: config.window_minutes,
            interval_minutes: config.interval_minutes,
            ..RelayConfig::default()
        },
    ));

    match relay.start() {
        Ok(()) => {
            health().relay.set_healthy();
            info!("Change-feed relay: running");
        }
        Err(e) => {
            health().relay.set_unhealthy(e.to_string());
            error!("Change-feed relay failed to start: {}", e);
        }
    }

    // Create application state and router
    let state = AppState::new(store, hub, keys);
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    relay.shutdown().await;
    health().relay.set_unhealthy("shut down");

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYTICS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides; the env source's underscore handling is unreliable
    // for underscored field names
    if let Ok(secret) = std::env::var("ANALYTICS_JWT_SECRET") {
        config.jwt_secret = secret;
    }
    if let Ok(port) = std::env::var("ANALYTICS_PORT") {
        config.port = port.parse().context("Invalid ANALYTICS_PORT")?;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
