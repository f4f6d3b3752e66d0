//! Administrative request types.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::session::EventType;

/// How far past the server clock a window may end.
///
/// Bounds the job count of a session; an `end` given in milliseconds is
/// rejected here rather than split into millions of jobs.
pub const MAX_END_SKEW_SECS: i64 = 60 * 60;

/// Request to start a new re-indexing session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Inclusive window start (unix seconds)
    #[validate(range(min = 1, message = "start must be a positive unix timestamp"))]
    pub start: i64,
    /// Inclusive window end; defaults to now
    #[serde(default)]
    pub end: Option<i64>,
    #[validate(length(min = 1, message = "at least one event type is required"))]
    pub event_types: Vec<EventType>,
}

/// A validated re-indexing window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: i64,
    pub end: i64,
    /// Deduplicated, sorted
    pub event_types: Vec<EventType>,
}

impl CreateSessionRequest {
    /// Validates the request, filling a missing `end` with `now`.
    pub fn into_window(self, now: i64) -> Result<SessionWindow> {
        self.validate()
            .map_err(|e| Error::validation(e.to_string()))?;

        let end = self.end.unwrap_or(now);
        if end > now.saturating_add(MAX_END_SKEW_SECS) {
            return Err(Error::validation(format!(
                "end ({}) is in the future; expected unix seconds no later than {}",
                end, now
            )));
        }
        if self.start >= end {
            return Err(Error::validation(format!(
                "start ({}) must be before end ({})",
                self.start, end
            )));
        }

        let mut event_types = self.event_types;
        event_types.sort();
        event_types.dedup();

        Ok(SessionWindow {
            start: self.start,
            end,
            event_types,
        })
    }
}
