//! Session scheduler.
//!
//! A recurring tick drives the single active session forward. Each tick
//! runs under a named single-flight lock, so across all replicas at most
//! one tick body executes at a time.

use engine_core::{Error, IndexingSession, IndexingStatus, Result};
use reindex_store::{with_lock, SessionFilter, SessionStore, SingleFlightLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{health, log_snapshot, metrics};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::abort::AbortSignal;
use crate::indexer::Indexer;
use crate::job::execute_job;

/// Name of the lock guarding the tick body and startup recovery.
pub const SCHEDULER_LOCK: &str = "indexing-session-scheduler";

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks
    pub tick_interval: Duration,
    /// Lease on the scheduler lock; must outlast the longest tick
    pub lock_ttl: Duration,
    /// Metrics snapshot log interval
    pub metrics_log_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            lock_ttl: Duration::from_secs(6 * 3600),
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick holds the lock
    Skipped,
    /// No active session
    Idle,
    Aborted,
    Completed,
    Failed,
    /// The tick stopped on an unexpected error; state is retried next tick
    Errored,
}

/// Drives indexing sessions through their lifecycle.
pub struct SessionScheduler {
    config: SchedulerConfig,
    store: Arc<dyn SessionStore>,
    indexer: Arc<dyn Indexer>,
    abort: AbortSignal,
    lock: Arc<dyn SingleFlightLock>,
}

impl SessionScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn SessionStore>,
        indexer: Arc<dyn Indexer>,
        abort: AbortSignal,
        lock: Arc<dyn SingleFlightLock>,
    ) -> Self {
        Self {
            config,
            store,
            indexer,
            abort,
            lock,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs one tick if the scheduler lock is free.
    ///
    /// Never fails: errors are logged and reported through health.
    pub async fn tick(&self) -> TickOutcome {
        let started = Instant::now();
        let result = with_lock(
            self.lock.as_ref(),
            SCHEDULER_LOCK,
            self.config.lock_ttl,
            self.run_tick(),
        )
        .await;

        let m = metrics();
        let outcome = match result {
            Ok(None) => {
                m.ticks_skipped.inc();
                debug!("Scheduler lock busy, tick skipped");
                return TickOutcome::Skipped;
            }
            Ok(Some(Ok(outcome))) => {
                health().scheduler.set_healthy();
                outcome
            }
            Ok(Some(Err(e))) | Err(e) => {
                m.ticks_failed.inc();
                health().scheduler.set_unhealthy(e.to_string());
                error!(error = %e, "Scheduler tick failed");
                TickOutcome::Errored
            }
        };

        m.ticks_run.inc();
        m.tick_duration_ms.observe(started.elapsed().as_millis() as u64);
        outcome
    }

    /// The tick body. Callers must hold the scheduler lock.
    pub async fn run_tick(&self) -> Result<TickOutcome> {
        let Some(mut session) = self.store.find_one(&SessionFilter::active()).await? else {
            metrics().pending_jobs.set(0);
            debug!("No active session");
            return Ok(TickOutcome::Idle);
        };

        if self.abort.is_requested(&session.name).await {
            let aborted = session.mark_aborted();
            self.persist(&mut session).await?;
            self.abort.clear(&session.name).await;
            metrics().sessions_aborted.inc();
            info!(session = %session.name, jobs_aborted = aborted, "Session aborted");
            return Ok(TickOutcome::Aborted);
        }

        if session.status == IndexingStatus::Pending {
            session.status = IndexingStatus::InProgress;
            self.persist(&mut session).await?;
            info!(
                session = %session.name,
                jobs = session.jobs.len(),
                "Session started"
            );
        }

        for index in session.eligible_jobs() {
            session.jobs[index].status = IndexingStatus::InProgress;
            self.persist(&mut session).await?;

            let job = &session.jobs[index];
            info!(
                session = %session.name,
                order = job.order,
                start = job.start_timestamp,
                end = job.end_timestamp,
                "Job started"
            );

            match execute_job(self.indexer.as_ref(), job, &session.event_types).await {
                Ok(done) => {
                    info!(
                        session = %session.name,
                        order = done.order,
                        attempts = done.run_attempts,
                        error_count = done.error_count,
                        duration_ms = done.duration_ms,
                        "Job completed"
                    );
                    session.jobs[index] = done;
                    self.persist(&mut session).await?;
                }
                Err(e) => {
                    if let Error::JobExhausted { attempts, .. } = &e {
                        session.jobs[index].run_attempts = *attempts;
                    }
                    error!(session = %session.name, error = %e, "Job exhausted, failing session");
                    let failed = session.mark_failed();
                    self.persist(&mut session).await?;
                    metrics().sessions_failed.inc();
                    info!(session = %session.name, jobs_failed = failed, "Session failed");
                    return Ok(TickOutcome::Failed);
                }
            }
        }

        session.mark_completed();
        self.persist(&mut session).await?;
        metrics().sessions_completed.inc();
        info!(session = %session.name, "Session completed");
        Ok(TickOutcome::Completed)
    }

    /// Demotes jobs a crashed run left `IN_PROGRESS` back to `PENDING`.
    ///
    /// Runs under the scheduler lock; returns `None` when the lock is held,
    /// since the holder is then a live replica still working the session.
    pub async fn recover(&self) -> Result<Option<usize>> {
        with_lock(
            self.lock.as_ref(),
            SCHEDULER_LOCK,
            self.config.lock_ttl,
            self.recover_stranded(),
        )
        .await?
        .transpose()
    }

    async fn recover_stranded(&self) -> Result<usize> {
        let Some(mut session) = self.store.find_one(&SessionFilter::active()).await? else {
            return Ok(0);
        };

        let recovered = session.recover_stranded_jobs();
        if recovered > 0 {
            self.persist(&mut session).await?;
            metrics().jobs_recovered.inc_by(recovered as u64);
            warn!(
                session = %session.name,
                jobs = recovered,
                "Recovered jobs left in progress by a previous run"
            );
        }
        Ok(recovered)
    }

    /// Writes `session` over its stored revision and adopts the result.
    async fn persist(&self, session: &mut IndexingSession) -> Result<()> {
        *session = self
            .store
            .find_one_and_update(&SessionFilter::revision_of(session), session)
            .await?;

        let pending = if session.is_active() {
            let counts = session.job_counts();
            (counts.pending + counts.in_progress) as u64
        } else {
            0
        };
        metrics().pending_jobs.set(pending);
        Ok(())
    }

    /// Starts the tick loop and the metrics log loop.
    ///
    /// Both stop once `shutdown` flips; an in-flight tick runs to completion.
    pub fn start(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        let rx = shutdown.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_tick_loop(rx).await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_log(shutdown).await;
        }));

        info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            lock_ttl_secs = self.config.lock_ttl.as_secs(),
            "Session scheduler started"
        );
        handles
    }

    async fn run_tick_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            self.tick().await;
        }
        info!("Session scheduler stopped");
    }

    async fn run_metrics_log(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.metrics_log_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => log_snapshot(&metrics().snapshot()),
                _ = shutdown.changed() => break,
            }
        }
    }
}
