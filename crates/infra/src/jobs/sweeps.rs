//! Periodic maintenance over the job table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::store::JobStore;

use super::error::JobError;
use super::service::JobService;

/// Error message recorded when the worker never answered for a PROCESSING job.
pub const STALE_JOB_ERROR: &str = "timeout - worker did not respond";

/// Error message recorded when a stranded QUEUED job still finds no worker.
pub const UNDISPATCHED_JOB_ERROR: &str = "timeout - no worker accepted the job";

/// One pass of a periodic maintenance task.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn sweep(&self) -> Result<(), JobError>;
}

/// Outcome of one stale-job sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// PROCESSING jobs that were failed with a timeout.
    pub timed_out: usize,
    /// QUEUED jobs whose dispatch was never accepted, accepted by the worker on this pass.
    pub redispatched: usize,
    /// Stranded QUEUED jobs the worker refused again; each was charged a failed attempt.
    pub undispatched: usize,
    /// Jobs the sweep could not process; retried on the next pass.
    pub errors: usize,
}

/// Reclaims jobs the worker silently dropped.
///
/// A stale PROCESSING job is failed through the regular failure path, so it is retried
/// or failed permanently exactly like a worker-reported failure. A QUEUED job untouched
/// for as long is dispatched again; if no worker takes it, it goes down the same failure
/// path, so a job nobody picks up cannot hold its target forever.
#[derive(Debug, Clone)]
pub struct StaleJobReaper {
    service: Arc<JobService>,
    stale_after: Duration,
}

impl StaleJobReaper {
    pub fn new(service: Arc<JobService>, stale_after: Duration) -> Self {
        Self {
            service,
            stale_after,
        }
    }

    pub async fn reap_at(&self, now: DateTime<Utc>) -> Result<ReapReport, JobError> {
        let cutoff = now - self.stale_after;
        let mut report = ReapReport::default();

        for job in self.service.store().list_stale_processing(cutoff).await? {
            warn!(
                job_id = %job.id,
                started_at = ?job.started_at,
                attempts = job.attempts,
                "job stuck in PROCESSING; timing out"
            );
            match self.service.on_failure(job.id, STALE_JOB_ERROR).await {
                Ok(_) => report.timed_out += 1,
                // A callback landed between listing and failing it.
                Err(JobError::InvalidState(_)) | Err(JobError::NotFound(_)) => {
                    debug!(job_id = %job.id, "stale job settled concurrently");
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "failed to time out stale job");
                    report.errors += 1;
                }
            }
        }

        for job in self.service.store().list_stranded_queued(cutoff).await? {
            info!(job_id = %job.id, priority = job.priority, "re-dispatching stranded queued job");
            let refusal = match self.service.dispatch_and_wait(&job).await {
                Ok(()) => {
                    report.redispatched += 1;
                    continue;
                }
                Err(e) => e,
            };

            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                error = %refusal,
                "stranded job still not accepted; counting a failed attempt"
            );
            match self.service.on_failure(job.id, UNDISPATCHED_JOB_ERROR).await {
                Ok(_) => report.undispatched += 1,
                Err(JobError::InvalidState(_)) | Err(JobError::NotFound(_)) => {
                    debug!(job_id = %job.id, "stranded job settled concurrently");
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "failed to fail stranded job");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl Sweep for StaleJobReaper {
    fn name(&self) -> &'static str {
        "stale-job-reaper"
    }

    async fn sweep(&self) -> Result<(), JobError> {
        let report = self.reap_at(Utc::now()).await?;
        info!(
            timed_out = report.timed_out,
            redispatched = report.redispatched,
            undispatched = report.undispatched,
            errors = report.errors,
            "stale job sweep finished"
        );
        Ok(())
    }
}

/// Deletes COMPLETED jobs past the retention window. FAILED and CANCELLED jobs are kept.
#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn JobStore>,
    retention: Duration,
}

impl std::fmt::Debug for RetentionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionSweeper")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn JobStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Returns the number of deleted jobs.
    pub async fn purge_at(&self, now: DateTime<Utc>) -> Result<u64, JobError> {
        Ok(self.store.delete_completed_before(now - self.retention).await?)
    }
}

#[async_trait]
impl Sweep for RetentionSweeper {
    fn name(&self) -> &'static str {
        "retention-sweeper"
    }

    async fn sweep(&self) -> Result<(), JobError> {
        let deleted = self.purge_at(Utc::now()).await?;
        info!(
            deleted,
            retention_days = self.retention.num_days(),
            "cleaned up completed jobs"
        );
        Ok(())
    }
}
