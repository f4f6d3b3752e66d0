//! Session creation.

use chrono::Utc;
use engine_core::{split_into_jobs, Error, IndexingSession, Result, SessionWindow};
use reindex_store::{SessionFilter, SessionStore};
use std::sync::Arc;
use telemetry::metrics;
use tracing::info;

/// Validates windows into persisted `PENDING` sessions.
#[derive(Clone)]
pub struct SessionFactory {
    store: Arc<dyn SessionStore>,
}

impl SessionFactory {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Splits `window` into weekly jobs and stores a new session.
    ///
    /// Fails with `SESSION_001` while another session is active.
    pub async fn create(&self, window: SessionWindow) -> Result<IndexingSession> {
        if let Some(active) = self.store.find_one(&SessionFilter::active()).await? {
            return Err(Error::conflict(format!(
                "a session is already active: {}",
                active.name
            )));
        }

        let jobs = split_into_jobs(window.start, window.end);
        let session = IndexingSession::new(
            window.start,
            window.end,
            window.event_types,
            jobs,
            Utc::now(),
        );

        let session = self.store.create(session).await?;
        metrics().sessions_created.inc();

        info!(
            session = %session.name,
            start = session.start_timestamp,
            end = session.end_timestamp,
            jobs = session.jobs.len(),
            "Session created"
        );
        Ok(session)
    }
}
