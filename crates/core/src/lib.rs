//! Core types, job splitting, and validation for the re-indexing engine.

pub mod error;
pub mod request;
pub mod session;
pub mod split;

pub use error::{Error, Result};
pub use request::*;
pub use session::*;
pub use split::*;
