//! Cache-resident abort flags for sessions.

use reindex_store::KeyValueCache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long an unconsumed abort request stays set.
pub const ABORT_SIGNAL_TTL: Duration = Duration::from_secs(3600);

/// Cache key for a session's abort flag.
pub fn abort_key(session_name: &str) -> String {
    format!("indexing-session:abort:{}", session_name)
}

/// Requests and consumes cooperative session aborts.
///
/// The scheduler polls the flag once per tick, so an abort takes effect at
/// the next tick boundary.
#[derive(Clone)]
pub struct AbortSignal {
    cache: Arc<dyn KeyValueCache>,
}

impl AbortSignal {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    pub async fn request(&self, session_name: &str) {
        self.cache
            .set(&abort_key(session_name), Value::Bool(true), ABORT_SIGNAL_TTL)
            .await;
        info!(session = session_name, "Abort requested");
    }

    pub async fn is_requested(&self, session_name: &str) -> bool {
        matches!(
            self.cache.get(&abort_key(session_name)).await,
            Some(Value::Bool(true))
        )
    }

    pub async fn clear(&self, session_name: &str) {
        self.cache.delete(&abort_key(session_name)).await;
    }
}
