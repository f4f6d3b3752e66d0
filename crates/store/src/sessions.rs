//! Session store contract.

use async_trait::async_trait;
use engine_core::{IndexingSession, IndexingStatus, Result};

/// Selects sessions by key, status, and version.
///
/// Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Session name or id
    pub key: Option<String>,
    /// Accepted statuses (empty = any)
    pub statuses: Vec<IndexingStatus>,
    /// Expected stored version
    pub version: Option<u64>,
}

impl SessionFilter {
    /// Matches the session in `PENDING` or `IN_PROGRESS`.
    pub fn active() -> Self {
        Self {
            statuses: IndexingStatus::ACTIVE.to_vec(),
            ..Self::default()
        }
    }

    /// Matches a session by name or id.
    pub fn by_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Matches exactly the stored revision of `session`.
    pub fn revision_of(session: &IndexingSession) -> Self {
        Self {
            key: Some(session.name.clone()),
            statuses: Vec::new(),
            version: Some(session.version),
        }
    }

    pub fn matches(&self, session: &IndexingSession) -> bool {
        if let Some(ref key) = self.key {
            if !session.matches_key(key) {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&session.status) {
            return false;
        }
        if let Some(version) = self.version {
            if session.version != version {
                return false;
            }
        }
        true
    }
}

/// Persistent, strongly-consistent home of indexing sessions.
///
/// Every write stores the whole document and bumps its `version`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session.
    ///
    /// Fails if the name is taken or another session is active.
    async fn create(&self, session: IndexingSession) -> Result<IndexingSession>;

    /// Newest session matching `filter`.
    async fn find_one(&self, filter: &SessionFilter) -> Result<Option<IndexingSession>>;

    /// Replaces the session matching `filter` with `session`.
    ///
    /// Fails with `SESSION_004` if a session with that name exists but its
    /// stored version differs from `filter.version`.
    async fn find_one_and_update(
        &self,
        filter: &SessionFilter,
        session: &IndexingSession,
    ) -> Result<IndexingSession>;

    /// Sessions, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<IndexingSession>>;

    /// Whether the backing store is reachable.
    async fn ping(&self) -> bool {
        true
    }
}
