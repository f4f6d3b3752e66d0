//! Internal metrics collection.
//!
//! Collects scheduler metrics in-memory; the scheduler logs a snapshot
//! periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for duration tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 100ms, 1s, 5s, 30s, 1m, 5m, 15m, 30m, 1h, 2h, 6h
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [
        100, 1_000, 5_000, 30_000, 60_000, 300_000, 900_000, 1_800_000, 3_600_000, 7_200_000,
        21_600_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the re-indexing scheduler.
#[derive(Debug, Default)]
pub struct Metrics {
    // Tick metrics
    pub ticks_run: Counter,
    pub ticks_skipped: Counter,
    pub ticks_failed: Counter,

    // Session metrics
    pub sessions_created: Counter,
    pub sessions_completed: Counter,
    pub sessions_failed: Counter,
    pub sessions_aborted: Counter,
    pub jobs_recovered: Counter,

    // Job metrics
    pub jobs_completed: Counter,
    pub job_attempts_failed: Counter,
    pub events_skipped: Counter,

    // Latency histograms
    pub tick_duration_ms: Histogram,
    pub job_duration_ms: Histogram,

    // Gauges
    pub pending_jobs: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub ticks_run: u64,
    pub ticks_skipped: u64,
    pub ticks_failed: u64,
    pub sessions_created: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub sessions_aborted: u64,
    pub jobs_recovered: u64,
    pub jobs_completed: u64,
    pub job_attempts_failed: u64,
    pub events_skipped: u64,
    pub tick_duration_mean_ms: f64,
    pub job_duration_mean_ms: f64,
    pub pending_jobs: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            ticks_run: self.ticks_run.get(),
            ticks_skipped: self.ticks_skipped.get(),
            ticks_failed: self.ticks_failed.get(),
            sessions_created: self.sessions_created.get(),
            sessions_completed: self.sessions_completed.get(),
            sessions_failed: self.sessions_failed.get(),
            sessions_aborted: self.sessions_aborted.get(),
            jobs_recovered: self.jobs_recovered.get(),
            jobs_completed: self.jobs_completed.get(),
            job_attempts_failed: self.job_attempts_failed.get(),
            events_skipped: self.events_skipped.get(),
            tick_duration_mean_ms: self.tick_duration_ms.mean(),
            job_duration_mean_ms: self.job_duration_ms.mean(),
            pending_jobs: self.pending_jobs.get(),
        }
    }
}

/// Log a metrics snapshot as one structured line.
pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        ticks_run = snapshot.ticks_run,
        ticks_skipped = snapshot.ticks_skipped,
        ticks_failed = snapshot.ticks_failed,
        sessions_completed = snapshot.sessions_completed,
        sessions_failed = snapshot.sessions_failed,
        sessions_aborted = snapshot.sessions_aborted,
        jobs_completed = snapshot.jobs_completed,
        job_attempts_failed = snapshot.job_attempts_failed,
        job_duration_mean_ms = snapshot.job_duration_mean_ms,
        pending_jobs = snapshot.pending_jobs,
        "Scheduler metrics"
    );
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
