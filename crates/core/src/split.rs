//! Splitting a re-indexing window into bounded jobs.

use crate::session::Job;

/// Longest span a single job may cover.
pub const ONE_WEEK_SECS: i64 = 7 * 24 * 60 * 60;

/// Splits the inclusive window `[start, end]` into week-sized jobs.
///
/// Consecutive jobs satisfy `prev.end + 1 == next.start`. When a chunk would
/// end exactly one second before `end`, it is shortened by a second so the
/// final job never covers a single second.
pub fn split_into_jobs(start: i64, end: i64) -> Vec<Job> {
    let mut jobs = Vec::new();
    if start > end {
        return jobs;
    }

    let mut current_start = start;
    let mut order = 0u32;

    loop {
        let mut chunk_end = current_start.saturating_add(ONE_WEEK_SECS).min(end);
        if chunk_end.checked_add(1) == Some(end) {
            chunk_end -= 1;
        }

        jobs.push(Job::new(current_start, chunk_end, order));
        if chunk_end >= end {
            break;
        }
        // chunk_end < end, so this cannot overflow
        current_start = chunk_end + 1;
        order += 1;
    }

    jobs
}
