//! Persistence and coordination primitives for the re-indexing engine.
//!
//! - Session store (ClickHouse or in-memory)
//! - Key-value cache with per-entry TTL
//! - Named single-flight locks

pub mod cache;
pub mod client;
pub mod clickhouse_store;
pub mod config;
pub mod lock;
pub mod memory;
pub mod schema;
pub mod sessions;

pub use cache::{KeyValueCache, MokaCache};
pub use client::*;
pub use clickhouse_store::ClickHouseSessionStore;
pub use config::*;
pub use lock::{with_lock, InProcessLock, LockLease, SingleFlightLock};
pub use memory::MemorySessionStore;
pub use sessions::{SessionFilter, SessionStore};
