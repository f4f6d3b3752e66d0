//! DEX Analytics Re-indexing Engine
//!
//! Administratively-triggered re-indexing of historical on-chain events:
//! - Admin API to create, inspect, and abort indexing sessions
//! - Weekly job splitting with per-job retry
//! - Single-flight scheduler ticks with cooperative abort
//! - Startup recovery of jobs stranded by a crash

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use api::{router, AppState};
use reindex_store::{
    ClickHouseClient, ClickHouseConfig, ClickHouseSessionStore, InProcessLock, MemorySessionStore,
    MokaCache, SessionStore,
};
use telemetry::{health, init_tracing, LogConfig};
use worker::{AbortSignal, HttpIndexer, SchedulerConfig, SessionScheduler};

/// Session store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreKind {
    #[default]
    Clickhouse,
    Memory,
}

/// Indexing function endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexerConfig {
    /// Base URL; required. `mock` runs a no-op indexer (memory store only)
    #[serde(default)]
    url: String,
    /// Per-call timeout; one call covers up to a week of events
    #[serde(default = "default_indexer_timeout_secs")]
    timeout_secs: u64,
}

fn default_indexer_timeout_secs() -> u64 {
    1800
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_indexer_timeout_secs(),
        }
    }
}

/// Scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchedulerSettings {
    #[serde(default = "default_tick_interval_secs")]
    tick_interval_secs: u64,
    #[serde(default = "default_lock_ttl_secs")]
    lock_ttl_secs: u64,
    #[serde(default = "default_metrics_log_interval_secs")]
    metrics_log_interval_secs: u64,
    /// Operator assertion that exactly one instance runs against the store.
    /// The lock and abort flag are process-local, so ClickHouse deployments
    /// must set this.
    #[serde(default)]
    single_replica: bool,
}

fn default_tick_interval_secs() -> u64 {
    10
}

fn default_lock_ttl_secs() -> u64 {
    6 * 3600
}

fn default_metrics_log_interval_secs() -> u64 {
    60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
            single_replica: false,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(s: &SchedulerSettings) -> Self {
        Self {
            tick_interval: Duration::from_secs(s.tick_interval_secs.max(1)),
            lock_ttl: Duration::from_secs(s.lock_ttl_secs.max(1)),
            metrics_log_interval: Duration::from_secs(s.metrics_log_interval_secs.max(1)),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Bearer token for admin routes; empty leaves them open
    #[serde(default)]
    admin_token: String,

    #[serde(default)]
    store: StoreKind,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    indexer: IndexerConfig,

    #[serde(default)]
    scheduler: SchedulerSettings,

    #[serde(default)]
    log: LogConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: String::new(),
            store: StoreKind::default(),
            clickhouse: ClickHouseConfig::default(),
            indexer: IndexerConfig::default(),
            scheduler: SchedulerSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Rejects configurations that would run but report false results.
    fn validate(&self) -> Result<()> {
        let indexer_url = self.indexer.url.trim();
        if indexer_url.is_empty() {
            bail!(
                "indexer.url is required (REINDEX_INDEXER_URL); \
                 use `mock` for a no-op indexer"
            );
        }

        if self.store == StoreKind::Clickhouse {
            if indexer_url == "mock" {
                bail!(
                    "the mock indexer would mark persisted sessions COMPLETED \
                     without indexing; use store = memory"
                );
            }
            if !self.scheduler.single_replica {
                bail!(
                    "scheduler lock and abort flag are process-local; \
                     set scheduler.single_replica = true (REINDEX_SCHEDULER_SINGLE_REPLICA) \
                     and run exactly one instance against ClickHouse"
                );
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log);

    config.validate().context("Invalid configuration")?;

    info!("Starting re-indexing engine v{}", env!("CARGO_PKG_VERSION"));

    if config.admin_token.is_empty() {
        warn!("No admin token configured; admin routes are open");
    }

    let store = build_store(&config).await?;

    // Check health and update status
    check_health(store.as_ref()).await;

    let indexer = HttpIndexer::new(
        config.indexer.url.clone(),
        Duration::from_secs(config.indexer.timeout_secs),
    )
    .context("Failed to create indexer client")?;
    if indexer.is_mock() {
        warn!("Indexer running in mock mode; jobs complete without indexing");
    }

    let abort = AbortSignal::new(Arc::new(MokaCache::new()));
    let scheduler = Arc::new(SessionScheduler::new(
        SchedulerConfig::from(&config.scheduler),
        store.clone(),
        Arc::new(indexer),
        abort.clone(),
        Arc::new(InProcessLock::new()),
    ));

    match scheduler.recover().await {
        Ok(Some(0)) => {}
        Ok(Some(n)) => info!(jobs = n, "Recovered stranded jobs"),
        Ok(None) => info!("Scheduler lock held elsewhere, skipping recovery"),
        Err(e) => error!("Startup recovery failed: {}", e),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    health().scheduler.set_healthy();
    let scheduler_handles = scheduler.clone().start(shutdown_rx);

    let state = AppState::new(store, abort, config.admin_token.clone());
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    // Stop the scheduler; an in-flight tick finishes first
    let _ = shutdown_tx.send(true);
    for handle in scheduler_handles {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Build the configured session store.
async fn build_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    match config.store {
        StoreKind::Memory => {
            warn!("Using in-memory session store; sessions are lost on restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
        StoreKind::Clickhouse => {
            let clickhouse = Arc::new(
                ClickHouseClient::new(config.clickhouse.clone())
                    .context("Failed to create ClickHouse client")?,
            );

            if let Err(e) = clickhouse.ensure_schema().await {
                error!("Failed to initialize ClickHouse schema: {}", e);
                // Continue anyway - schema might already exist
            }

            Ok(Arc::new(ClickHouseSessionStore::new(clickhouse)))
        }
    }
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
                .prefix("REINDEX")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("REINDEX_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("REINDEX_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("REINDEX_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("REINDEX_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
    if let Ok(url) = std::env::var("REINDEX_INDEXER_URL") {
        config.indexer.url = url;
    }
    if let Ok(token) = std::env::var("REINDEX_ADMIN_TOKEN") {
        config.admin_token = token;
    }
    if let Ok(flag) = std::env::var("REINDEX_SCHEDULER_SINGLE_REPLICA") {
        config.scheduler.single_replica = flag
            .parse()
            .context("REINDEX_SCHEDULER_SINGLE_REPLICA must be true or false")?;
    }
    if let Ok(format) = std::env::var("REINDEX_LOG_FORMAT") {
        config.log.format = format.parse().map_err(anyhow::Error::msg)?;
    }
    if let Ok(secs) = std::env::var("REINDEX_SCHEDULER_LOCK_TTL_SECS") {
        config.scheduler.lock_ttl_secs = secs
            .parse()
            .context("REINDEX_SCHEDULER_LOCK_TTL_SECS must be an integer")?;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(store: &dyn SessionStore) {
    if store.ping().await {
        health().store.set_healthy();
        info!("Session store connection: healthy");
    } else {
        health().store.set_unhealthy("Connection failed");
        error!("Session store connection: unhealthy");
    }
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
