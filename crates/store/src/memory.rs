//! In-memory session store.
//!
//! Used by tests and single-replica deployments. The active-session check in
//! `create` and the version check in `find_one_and_update` run under the same
//! write lock, so both are atomic.

use async_trait::async_trait;
use chrono::Utc;
use engine_core::{Error, IndexingSession, Result};
use parking_lot::RwLock;

use crate::sessions::{SessionFilter, SessionStore};

/// In-memory session store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Vec<IndexingSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, mut session: IndexingSession) -> Result<IndexingSession> {
        let mut sessions = self.sessions.write();

        if sessions.iter().any(|s| s.name == session.name) {
            return Err(Error::store(format!(
                "session name already exists: {}",
                session.name
            )));
        }
        if let Some(active) = sessions.iter().find(|s| s.is_active()) {
            return Err(Error::conflict(format!(
                "a session is already active: {}",
                active.name
            )));
        }

        session.version = 1;
        sessions.push(session.clone());
        Ok(session)
    }

    async fn find_one(&self, filter: &SessionFilter) -> Result<Option<IndexingSession>> {
        Ok(self
            .sessions
            .read()
            .iter()
            .filter(|s| filter.matches(s))
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn find_one_and_update(
        &self,
        filter: &SessionFilter,
        session: &IndexingSession,
    ) -> Result<IndexingSession> {
        let mut sessions = self.sessions.write();

        let Some(index) = sessions.iter().position(|s| filter.matches(s)) else {
            let exists = sessions.iter().any(|s| s.name == session.name);
            return Err(if exists {
                Error::stale_write(format!(
                    "session {} changed since version {:?}",
                    session.name, filter.version
                ))
            } else {
                Error::not_found(format!("session not found: {}", session.name))
            });
        };

        let mut updated = session.clone();
        updated.version = sessions[index].version + 1;
        updated.updated_at = Utc::now();
        sessions[index] = updated.clone();
        Ok(updated)
    }

    async fn list(&self, limit: usize) -> Result<Vec<IndexingSession>> {
        let mut sessions = self.sessions.read().clone();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}
