//! Common test setup functions.

use api::{router, AppState};
use axum::Router;
use engine_core::{IndexingSession, SessionWindow};
use reindex_store::{InProcessLock, MemorySessionStore, MokaCache, SessionFilter, SessionStore};
use std::sync::Arc;
use worker::{AbortSignal, SchedulerConfig, SessionFactory, SessionScheduler};

use crate::mocks::MockIndexer;

/// Test context wired like production, with an in-memory store and a
/// mock indexer.
///
/// The router and the scheduler share the store and the abort cache, so
/// requests made over HTTP are visible to ticks run by the test.
pub struct TestContext {
    pub store: Arc<MemorySessionStore>,
    pub indexer: MockIndexer,
    pub lock: Arc<InProcessLock>,
    pub abort: AbortSignal,
    pub factory: SessionFactory,
    pub scheduler: Arc<SessionScheduler>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_admin_token("")
    }

    pub fn with_admin_token(token: &str) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let indexer = MockIndexer::new();
        let lock = Arc::new(InProcessLock::new());
        let abort = AbortSignal::new(Arc::new(MokaCache::new()));

        let scheduler = Arc::new(SessionScheduler::new(
            SchedulerConfig::default(),
            store.clone(),
            Arc::new(indexer.clone()),
            abort.clone(),
            lock.clone(),
        ));

        let state = AppState::new(store.clone(), abort.clone(), token);

        Self {
            factory: SessionFactory::new(store.clone()),
            store,
            indexer,
            lock,
            abort,
            scheduler,
            router: router(state),
        }
    }

    /// Create a session through the factory.
    pub async fn create_session(&self, window: SessionWindow) -> IndexingSession {
        self.factory
            .create(window)
            .await
            .expect("Failed to create session")
    }

    /// Current stored state of a session.
    pub async fn session(&self, name: &str) -> IndexingSession {
        self.store
            .find_one(&SessionFilter::by_key(name))
            .await
            .expect("Store query failed")
            .expect("Session not found")
    }

    /// Overwrite the stored session, as a crashed run would have left it.
    pub async fn overwrite(&self, session: &IndexingSession) -> IndexingSession {
        self.store
            .find_one_and_update(&SessionFilter::revision_of(session), session)
            .await
            .expect("Failed to overwrite session")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
