//! ClickHouse-backed session store.
//!
//! Each write inserts a new revision row; `ReplacingMergeTree(version)` plus
//! `FINAL` reads give full-document replace semantics. The read-check-insert
//! sequences below are not atomic: they are safe only while a single writer
//! holds the scheduler lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use engine_core::{Error, EventType, IndexingSession, IndexingStatus, Job, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::client::ClickHouseClient;
use crate::schema::{SESSIONS_TABLE, SESSION_COLUMNS};
use crate::sessions::{SessionFilter, SessionStore};

/// Flattened session row.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub name: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub event_types: Vec<String>,
    pub status: String,
    /// JSON-encoded job list
    pub jobs: String,
    pub version: u64,
    pub created_at: i64, // milliseconds since epoch
    pub updated_at: i64,
}

impl SessionRow {
    fn from_session(session: &IndexingSession) -> Result<Self> {
        Ok(Self {
            id: session.id.to_string(),
            name: session.name.clone(),
            start_timestamp: session.start_timestamp,
            end_timestamp: session.end_timestamp,
            event_types: session
                .event_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            status: session.status.as_str().to_string(),
            jobs: serde_json::to_string(&session.jobs)?,
            version: session.version,
            created_at: session.created_at.timestamp_millis(),
            updated_at: session.updated_at.timestamp_millis(),
        })
    }

    fn into_session(self) -> Result<IndexingSession> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::store(format!("Invalid session id {}: {}", self.id, e)))?;
        let event_types = self
            .event_types
            .iter()
            .map(|t| t.parse::<EventType>())
            .collect::<Result<Vec<_>>>()?;
        let jobs: Vec<Job> = serde_json::from_str(&self.jobs)?;

        Ok(IndexingSession {
            id,
            name: self.name,
            start_timestamp: self.start_timestamp,
            end_timestamp: self.end_timestamp,
            event_types,
            jobs,
            status: self.status.parse::<IndexingStatus>()?,
            version: self.version,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::store(format!("Invalid timestamp: {}", ms)))
}

/// Session store backed by the `indexing_sessions` table.
pub struct ClickHouseSessionStore {
    client: Arc<ClickHouseClient>,
}

impl ClickHouseSessionStore {
    pub fn new(client: Arc<ClickHouseClient>) -> Self {
        Self { client }
    }

    /// Latest revisions matching `filter`, newest first.
    async fn fetch(&self, filter: &SessionFilter, limit: usize) -> Result<Vec<IndexingSession>> {
        let mut sql = format!("SELECT {} FROM {} FINAL", SESSION_COLUMNS, SESSIONS_TABLE);

        let mut conditions = Vec::new();
        if filter.key.is_some() {
            conditions.push("(name = ? OR id = ?)".to_string());
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| format!("'{}'", s.as_str()))
                .collect();
            conditions.push(format!("status IN ({})", statuses.join(", ")));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT {}", limit));

        let mut query = self.client.inner().query(&sql);
        if let Some(ref key) = filter.key {
            query = query.bind(key.as_str()).bind(key.as_str());
        }

        let rows: Vec<SessionRow> = query
            .fetch_all()
            .await
            .map_err(|e| Error::store(format!("Query error: {}", e)))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let session = row.into_session()?;
            if filter.matches(&session) {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    async fn write(&self, session: &IndexingSession) -> Result<()> {
        let row = SessionRow::from_session(session)?;

        let mut insert = self
            .client
            .inner()
            .insert(SESSIONS_TABLE)
            .map_err(|e| Error::store(format!("Insert error: {}", e)))?;
        insert
            .write(&row)
            .await
            .map_err(|e| Error::store(format!("Write error: {}", e)))?;
        insert
            .end()
            .await
            .map_err(|e| Error::store(format!("End error: {}", e)))?;

        debug!(
            session = %session.name,
            version = session.version,
            status = %session.status,
            "Wrote session revision"
        );
        Ok(())
    }
}

#[async_trait]
impl SessionStore for ClickHouseSessionStore {
    async fn create(&self, mut session: IndexingSession) -> Result<IndexingSession> {
        let by_name = SessionFilter::by_key(session.name.clone());
        if !self.fetch(&by_name, 1).await?.is_empty() {
            return Err(Error::store(format!(
                "session name already exists: {}",
                session.name
            )));
        }
        if let Some(active) = self.fetch(&SessionFilter::active(), 1).await?.pop() {
            return Err(Error::conflict(format!(
                "a session is already active: {}",
                active.name
            )));
        }

        session.version = 1;
        self.write(&session).await?;
        Ok(session)
    }

    async fn find_one(&self, filter: &SessionFilter) -> Result<Option<IndexingSession>> {
        Ok(self.fetch(filter, 1).await?.pop())
    }

    async fn find_one_and_update(
        &self,
        filter: &SessionFilter,
        session: &IndexingSession,
    ) -> Result<IndexingSession> {
        let by_name = SessionFilter::by_key(session.name.clone());
        let Some(stored) = self.fetch(&by_name, 1).await?.pop() else {
            return Err(Error::not_found(format!(
                "session not found: {}",
                session.name
            )));
        };
        if !filter.matches(&stored) {
            return Err(Error::stale_write(format!(
                "session {} changed since version {:?}",
                session.name, filter.version
            )));
        }

        let mut updated = session.clone();
        updated.version = stored.version + 1;
        updated.updated_at = Utc::now();
        self.write(&updated).await?;
        Ok(updated)
    }

    async fn list(&self, limit: usize) -> Result<Vec<IndexingSession>> {
        self.fetch(&SessionFilter::default(), limit).await
    }

    async fn ping(&self) -> bool {
        self.client.ping().await
    }
}
