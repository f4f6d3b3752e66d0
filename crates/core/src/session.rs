//! Indexing session and job types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Maximum number of attempts for a single job execution.
pub const JOB_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle status shared by sessions and jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexingStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Aborted,
}

impl IndexingStatus {
    /// Statuses a session can hold while it is the active session.
    pub const ACTIVE: [IndexingStatus; 2] = [Self::InProgress, Self::Pending];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
        }
    }

    /// `PENDING` or `IN_PROGRESS`.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "ABORTED" => Ok(Self::Aborted),
            other => Err(Error::validation(format!("unknown status: {}", other))),
        }
    }
}

/// Blockchain event families a session re-indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SwapEvents,
    LiquidityEvents,
    BurnEvents,
}

impl EventType {
    pub const ALL: [EventType; 3] = [Self::SwapEvents, Self::LiquidityEvents, Self::BurnEvents];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SwapEvents => "SWAP_EVENTS",
            Self::LiquidityEvents => "LIQUIDITY_EVENTS",
            Self::BurnEvents => "BURN_EVENTS",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidEventType(s.to_string()))
    }
}

/// One bounded chunk of a session's time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Inclusive start (unix seconds)
    pub start_timestamp: i64,
    /// Inclusive end (unix seconds)
    pub end_timestamp: i64,
    /// Zero-based execution order
    pub order: u32,
    pub status: IndexingStatus,
    /// Attempts made by the latest execution
    pub run_attempts: u32,
    /// Skipped malformed events reported by the successful attempt
    pub error_count: u64,
    /// Wall-clock duration of the successful attempt
    pub duration_ms: u64,
}

impl Job {
    pub fn new(start_timestamp: i64, end_timestamp: i64, order: u32) -> Self {
        Self {
            start_timestamp,
            end_timestamp,
            order,
            status: IndexingStatus::Pending,
            run_attempts: 0,
            error_count: 0,
            duration_ms: 0,
        }
    }

    /// Whether the scheduler still has to run this job.
    pub fn is_eligible(&self) -> bool {
        self.status.is_active()
    }

    /// Span of the job in seconds.
    pub fn span_secs(&self) -> i64 {
        self.end_timestamp - self.start_timestamp
    }

    /// Puts the job back into its freshly-created state.
    pub fn reset(&mut self) {
        self.status = IndexingStatus::Pending;
        self.run_attempts = 0;
        self.error_count = 0;
        self.duration_ms = 0;
    }
}

/// One administratively-triggered re-indexing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingSession {
    pub id: Uuid,
    /// Unique name derived from the creation time
    pub name: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub event_types: Vec<EventType>,
    /// Ordered by `order` ascending
    pub jobs: Vec<Job>,
    pub status: IndexingStatus,
    /// Incremented by the store on every successful write
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexingSession {
    /// Creates a new `PENDING` session at version 0.
    pub fn new(
        start_timestamp: i64,
        end_timestamp: i64,
        event_types: Vec<EventType>,
        jobs: Vec<Job>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: session_name(created_at),
            start_timestamp,
            end_timestamp,
            event_types,
            jobs,
            status: IndexingStatus::Pending,
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether `key` is this session's name or id.
    pub fn matches_key(&self, key: &str) -> bool {
        self.name == key || self.id.to_string() == key
    }

    /// Indices of jobs still to run, in execution order.
    pub fn eligible_jobs(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.jobs.len())
            .filter(|&i| self.jobs[i].is_eligible())
            .collect();
        indices.sort_by_key(|&i| self.jobs[i].order);
        indices
    }

    /// Moves the session and every non-terminal job to `ABORTED`.
    ///
    /// Returns the number of jobs that were aborted.
    pub fn mark_aborted(&mut self) -> usize {
        self.status = IndexingStatus::Aborted;
        self.transition_jobs(
            |s| matches!(s, IndexingStatus::Pending | IndexingStatus::InProgress),
            IndexingStatus::Aborted,
        )
    }

    /// Moves the session and every unfinished job to `FAILED`.
    ///
    /// Jobs already `COMPLETED` or `FAILED` keep their status.
    pub fn mark_failed(&mut self) -> usize {
        self.status = IndexingStatus::Failed;
        self.transition_jobs(
            |s| {
                matches!(
                    s,
                    IndexingStatus::Pending | IndexingStatus::InProgress | IndexingStatus::Aborted
                )
            },
            IndexingStatus::Failed,
        )
    }

    pub fn mark_completed(&mut self) {
        self.status = IndexingStatus::Completed;
    }

    /// Demotes jobs stranded in `IN_PROGRESS` back to `PENDING`.
    pub fn recover_stranded_jobs(&mut self) -> usize {
        let mut recovered = 0;
        for job in self
            .jobs
            .iter_mut()
            .filter(|j| j.status == IndexingStatus::InProgress)
        {
            job.reset();
            recovered += 1;
        }
        recovered
    }

    /// Counts jobs per status, in declaration order of [`IndexingStatus`].
    pub fn job_counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in &self.jobs {
            match job.status {
                IndexingStatus::Pending => counts.pending += 1,
                IndexingStatus::InProgress => counts.in_progress += 1,
                IndexingStatus::Completed => counts.completed += 1,
                IndexingStatus::Failed => counts.failed += 1,
                IndexingStatus::Aborted => counts.aborted += 1,
            }
        }
        counts
    }

    fn transition_jobs(
        &mut self,
        from: impl Fn(IndexingStatus) -> bool,
        to: IndexingStatus,
    ) -> usize {
        let mut changed = 0;
        for job in self.jobs.iter_mut().filter(|j| from(j.status)) {
            job.status = to;
            changed += 1;
        }
        changed
    }
}

/// Per-status job tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub aborted: usize,
}

/// Session name for a creation instant.
pub fn session_name(created_at: DateTime<Utc>) -> String {
    format!("indexing-session-{}", created_at.timestamp_millis())
}
