//! Internal telemetry for the re-indexing engine.
//!
//! Structured logging setup, in-process scheduler metrics, and the
//! component health registry behind the `/health` probes.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
