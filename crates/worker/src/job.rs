//! Job execution with immediate retry.

use engine_core::{Error, EventType, IndexingStatus, Job, Result, JOB_MAX_ATTEMPTS};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::indexer::Indexer;

/// Runs `job` against the indexer, retrying failed attempts immediately.
///
/// Returns the job marked `COMPLETED`, with `run_attempts` counting the
/// attempts of this execution and `duration_ms` timing the successful one.
/// After `JOB_MAX_ATTEMPTS` failures returns `JOB_001`.
pub async fn execute_job(
    indexer: &dyn Indexer,
    job: &Job,
    event_types: &[EventType],
) -> Result<Job> {
    let mut job = job.clone();
    job.run_attempts = 0;
    let mut last_error = String::new();

    while job.run_attempts < JOB_MAX_ATTEMPTS {
        job.run_attempts += 1;
        let started = Instant::now();

        match indexer
            .index(job.start_timestamp, job.end_timestamp, event_types)
            .await
        {
            Ok(error_count) => {
                let elapsed = started.elapsed().as_millis() as u64;
                job.status = IndexingStatus::Completed;
                job.error_count = error_count;
                job.duration_ms = elapsed;

                let m = metrics();
                m.jobs_completed.inc();
                m.events_skipped.inc_by(error_count);
                m.job_duration_ms.observe(elapsed);

                debug!(
                    order = job.order,
                    attempt = job.run_attempts,
                    duration_ms = elapsed,
                    error_count,
                    "Job attempt succeeded"
                );
                return Ok(job);
            }
            Err(e) => {
                metrics().job_attempts_failed.inc();
                warn!(
                    order = job.order,
                    start = job.start_timestamp,
                    end = job.end_timestamp,
                    attempt = job.run_attempts,
                    max_attempts = JOB_MAX_ATTEMPTS,
                    error = %e,
                    "Job attempt failed"
                );
                last_error = e.to_string();
            }
        }
    }

    Err(Error::JobExhausted {
        start: job.start_timestamp,
        end: job.end_timestamp,
        attempts: job.run_attempts,
        last_error,
    })
}
