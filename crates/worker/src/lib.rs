//! Re-indexing session scheduler.
//!
//! - Session creation (window → weekly jobs)
//! - Abort signals (cache-resident flags)
//! - Job execution with retry against the indexing function
//! - The recurring scheduler tick and crash recovery

pub mod abort;
pub mod factory;
pub mod indexer;
pub mod job;
pub mod scheduler;

pub use abort::*;
pub use factory::SessionFactory;
pub use indexer::{HttpIndexer, Indexer};
pub use job::execute_job;
pub use scheduler::*;
