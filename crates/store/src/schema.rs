//! ClickHouse table schemas.
//!
//! Sessions are stored as one row per revision in a `ReplacingMergeTree`
//! keyed by name; reads use `FINAL` so only the highest `version` is seen.

/// SQL for creating the indexing sessions table.
///
/// The job list is embedded as a JSON string; there is no separate job table.
pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS indexing_sessions (
    id String,
    name String,
    start_timestamp Int64,
    end_timestamp Int64,
    event_types Array(String),
    status LowCardinality(String),
    jobs String,

    -- Revision
    version UInt64,
    created_at DateTime64(3),
    updated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(version)
ORDER BY name
SETTINGS index_granularity = 8192
"#;

/// Table name used by the session store.
pub const SESSIONS_TABLE: &str = "indexing_sessions";

/// Columns selected when reading sessions, in `SessionRow` field order.
pub const SESSION_COLUMNS: &str = "id, name, start_timestamp, end_timestamp, event_types, status, jobs, version, created_at, updated_at";

