//! Admin HTTP API for re-indexing sessions.

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
