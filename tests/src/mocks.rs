//! Mock implementations for testing.

use async_trait::async_trait;
use engine_core::{Error, EventType, IndexingSession, Result};
use parking_lot::Mutex;
use reindex_store::{MemorySessionStore, SessionFilter, SessionStore};
use std::collections::VecDeque;
use std::sync::Arc;
use worker::Indexer;

/// One recorded indexer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCall {
    pub start: i64,
    pub end: i64,
    pub event_types: Vec<EventType>,
}

/// Indexer that records calls and replays scripted outcomes.
///
/// Scripted outcomes are consumed one per call; once the script is empty
/// every call succeeds with `error_count` (or fails while `should_fail`).
#[derive(Clone, Default)]
pub struct MockIndexer {
    calls: Arc<Mutex<Vec<IndexCall>>>,
    script: Arc<Mutex<VecDeque<std::result::Result<u64, String>>>>,
    should_fail: Arc<Mutex<bool>>,
    error_count: Arc<Mutex<u64>>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        let mut script = self.script.lock();
        for i in 0..n {
            script.push_back(Err(format!("scripted failure {}", i + 1)));
        }
    }

    /// Succeed the next call with `error_count` skipped events.
    pub fn succeed_next(&self, error_count: u64) {
        self.script.lock().push_back(Ok(error_count));
    }

    /// Fail every unscripted call.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    /// Error count reported by unscripted successful calls.
    pub fn set_error_count(&self, error_count: u64) {
        *self.error_count.lock() = error_count;
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    async fn index(&self, start: i64, end: i64, event_types: &[EventType]) -> Result<u64> {
        self.calls.lock().push(IndexCall {
            start,
            end,
            event_types: event_types.to_vec(),
        });

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(Ok(count)) => Ok(count),
            Some(Err(msg)) => Err(Error::indexer(msg)),
            None if *self.should_fail.lock() => Err(Error::indexer("mock indexer failure")),
            None => Ok(*self.error_count.lock()),
        }
    }
}

/// Fault injected into a single session update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    /// The update fails as if the database were unreachable
    Unavailable,
    /// Another writer bumps the stored version first, so the update is stale
    ConcurrentWrite,
}

/// Session store over [`MemorySessionStore`] that injects a fault into the
/// n-th `find_one_and_update` call.
#[derive(Clone)]
pub struct FaultyStore {
    inner: Arc<MemorySessionStore>,
    updates: Arc<Mutex<usize>>,
    fault: Arc<Mutex<Option<(usize, StoreFault)>>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemorySessionStore>) -> Self {
        Self {
            inner,
            updates: Arc::new(Mutex::new(0)),
            fault: Arc::new(Mutex::new(None)),
        }
    }

    /// Inject `fault` into the `n`-th update from now (1-based).
    pub fn fault_update(&self, n: usize, fault: StoreFault) {
        let seen = *self.updates.lock();
        *self.fault.lock() = Some((seen + n, fault));
    }

    pub fn update_count(&self) -> usize {
        *self.updates.lock()
    }
}

#[async_trait]
impl SessionStore for FaultyStore {
    async fn create(&self, session: IndexingSession) -> Result<IndexingSession> {
        self.inner.create(session).await
    }

    async fn find_one(&self, filter: &SessionFilter) -> Result<Option<IndexingSession>> {
        self.inner.find_one(filter).await
    }

    async fn find_one_and_update(
        &self,
        filter: &SessionFilter,
        session: &IndexingSession,
    ) -> Result<IndexingSession> {
        let call = {
            let mut updates = self.updates.lock();
            *updates += 1;
            *updates
        };
        let fault = {
            let mut fault = self.fault.lock();
            match *fault {
                Some((at, kind)) if at == call => {
                    *fault = None;
                    Some(kind)
                }
                _ => None,
            }
        };

        match fault {
            Some(StoreFault::Unavailable) => {
                return Err(Error::store("injected: store unavailable"));
            }
            Some(StoreFault::ConcurrentWrite) => {
                if let Some(stored) = self
                    .inner
                    .find_one(&SessionFilter::by_key(session.name.clone()))
                    .await?
                {
                    self.inner
                        .find_one_and_update(&SessionFilter::revision_of(&stored), &stored)
                        .await?;
                }
            }
            None => {}
        }

        self.inner.find_one_and_update(filter, session).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<IndexingSession>> {
        self.inner.list(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let mock = MockIndexer::new();
        mock.fail_next(1);
        mock.succeed_next(7);

        assert!(mock.index(1, 2, &[]).await.is_err());
        assert_eq!(mock.index(3, 4, &[]).await.unwrap(), 7);
        assert_eq!(mock.index(5, 6, &[]).await.unwrap(), 0);
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[1].start, 3);
    }

    #[tokio::test]
    async fn test_faulty_store_fails_only_the_chosen_update() {
        let store = FaultyStore::new(Arc::new(MemorySessionStore::new()));
        let session = store
            .create(IndexingSession::new(
                1,
                10,
                vec![EventType::SwapEvents],
                engine_core::split_into_jobs(1, 10),
                chrono::Utc::now(),
            ))
            .await
            .unwrap();

        store.fault_update(2, StoreFault::Unavailable);
        let session = store
            .find_one_and_update(&SessionFilter::revision_of(&session), &session)
            .await
            .unwrap();
        assert!(store
            .find_one_and_update(&SessionFilter::revision_of(&session), &session)
            .await
            .is_err());
        assert!(store
            .find_one_and_update(&SessionFilter::revision_of(&session), &session)
            .await
            .is_ok());
        assert_eq!(store.update_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let mock = MockIndexer::new();
        mock.set_should_fail(true);
        assert!(mock.index(1, 2, &[EventType::SwapEvents]).await.is_err());
    }
}
