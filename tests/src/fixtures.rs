//! Test fixtures.

use engine_core::{EventType, SessionWindow};

pub const DAY: i64 = 86_400;
pub const WEEK: i64 = 7 * DAY;

/// Start of the reference window used across tests.
pub const START: i64 = 1_000_000;

/// Window shorter than a week: one job.
pub fn one_job_window() -> SessionWindow {
    SessionWindow {
        start: START,
        end: START + DAY,
        event_types: vec![EventType::SwapEvents],
    }
}

/// Eight-day window: two jobs.
pub fn eight_day_window() -> SessionWindow {
    SessionWindow {
        start: START,
        end: START + 8 * DAY,
        event_types: vec![EventType::SwapEvents],
    }
}

/// JSON body for `POST /indexing-sessions`.
pub fn create_body(start: i64, end: i64, event_types: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "start": start,
        "end": end,
        "eventTypes": event_types,
    })
}
