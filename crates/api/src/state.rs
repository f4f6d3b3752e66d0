//! Application state shared across handlers.

use reindex_store::SessionStore;
use std::sync::Arc;
use worker::{AbortSignal, SessionFactory};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Session store (ClickHouse in production, in-memory in tests)
    pub store: Arc<dyn SessionStore>,
    pub factory: SessionFactory,
    /// Must share its cache with the scheduler's abort signal
    pub abort: AbortSignal,
    /// Bearer token for admin routes; empty disables the check
    pub admin_token: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        abort: AbortSignal,
        admin_token: impl Into<String>,
    ) -> Self {
        Self {
            factory: SessionFactory::new(store.clone()),
            store,
            abort,
            admin_token: Arc::from(admin_token.into()),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        !self.admin_token.is_empty()
    }
}
