//! ClickHouse connection for the session store.

use crate::config::ClickHouseConfig;
use crate::schema::CREATE_SESSIONS_TABLE;
use clickhouse::Client;
use engine_core::{Error, Result};
use tracing::{debug, info, warn};

/// Handle to the database holding `indexing_sessions`.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Builds a client; no connection is made until the first query.
    ///
    /// `timeout_secs` is sent as the server-side `max_execution_time`.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
            return Err(Error::store(format!(
                "ClickHouse url must be http(s): {:?}",
                config.url
            )));
        }
        if config.database.trim().is_empty() {
            return Err(Error::store("ClickHouse database name is empty"));
        }

        let mut inner = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_option("max_execution_time", config.timeout_secs.to_string());
        if let Some(ref user) = config.username {
            inner = inner.with_user(user);
        }
        if let Some(ref pass) = config.password {
            inner = inner.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            authenticated = config.username.is_some(),
            "ClickHouse session store configured"
        );

        Ok(Self { inner, config })
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Round-trips `SELECT 1`; failures are logged, not returned.
    pub async fn ping(&self) -> bool {
        match self.inner.query("SELECT 1").fetch_one::<u8>().await {
            Ok(_) => true,
            Err(e) => {
                warn!(database = %self.config.database, error = %e, "ClickHouse ping failed");
                false
            }
        }
    }

    /// Creates `indexing_sessions` if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.inner
            .query(CREATE_SESSIONS_TABLE)
            .execute()
            .await
            .map_err(|e| Error::store(format!("Failed to create sessions table: {}", e)))?;
        debug!(database = %self.config.database, "Sessions table ready");
        Ok(())
    }
}
