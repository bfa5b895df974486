//! Job status transitions.
//!
//! ```text
//! QUEUED ──start──▶ PROCESSING ──complete──▶ COMPLETED
//!   │  ▲                │
//!   │  └──fail (retry)──┤
//!   │                   └──fail (exhausted)──▶ FAILED ──retry──▶ QUEUED
//!   └──cancel──▶ CANCELLED ◀──cancel── PROCESSING
//! ```
//!
//! Completion and failure are accepted from QUEUED as well, since a worker may
//! answer before its acceptance was recorded. Every function either applies the
//! whole transition or returns an error and leaves the job unchanged.

use chrono::{DateTime, Utc};

use synopsi_core::{DomainError, DomainResult, Job, JobStatus};

/// Suffix appended to the error message of a job that will be retried.
pub const RETRY_SUFFIX: &str = " (will retry)";

/// Where a failure callback left the job.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back in the queue for another attempt.
    Requeued,
    /// Attempts exhausted; the job is FAILED for good.
    Exhausted,
}

fn require_active(job: &Job, action: &str) -> DomainResult<()> {
    if job.status.is_active() {
        Ok(())
    } else {
        Err(DomainError::invalid_state(format!(
            "cannot {action} job {}: job is {}",
            job.id, job.status
        )))
    }
}

/// The worker accepted the job.
pub fn start(
    job: &mut Job,
    worker_external_id: Option<String>,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    if job.status != JobStatus::Queued {
        return Err(DomainError::invalid_state(format!(
            "cannot start job {}: job is {}",
            job.id, job.status
        )));
    }
    job.status = JobStatus::Processing;
    job.started_at = Some(now);
    if worker_external_id.is_some() {
        job.worker_external_id = worker_external_id;
    }
    job.updated_at = now;
    Ok(())
}

/// Record a worker acceptance for the dispatch made at `attempt`.
///
/// An acceptance that arrives after the job was failed and re-queued belongs to an
/// earlier attempt and is rejected, so the newer dispatch keeps its worker id.
pub fn start_attempt(
    job: &mut Job,
    attempt: u32,
    worker_external_id: Option<String>,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    if job.attempts != attempt {
        return Err(DomainError::invalid_state(format!(
            "stale acceptance for job {}: dispatched at attempt {attempt}, job is at attempt {}",
            job.id, job.attempts
        )));
    }
    start(job, worker_external_id, now)
}

pub fn complete(job: &mut Job, now: DateTime<Utc>) -> DomainResult<()> {
    require_active(job, "complete")?;
    job.status = JobStatus::Completed;
    job.completed_at = Some(now);
    job.error_message = None;
    job.updated_at = now;
    Ok(())
}

/// Record one failed attempt.
pub fn fail(job: &mut Job, error_message: &str, now: DateTime<Utc>) -> DomainResult<FailureOutcome> {
    require_active(job, "fail")?;
    job.attempts += 1;
    job.updated_at = now;

    if job.has_attempts_left() {
        job.status = JobStatus::Queued;
        job.error_message = Some(format!("{error_message}{RETRY_SUFFIX}"));
        Ok(FailureOutcome::Requeued)
    } else {
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message.to_string());
        job.completed_at = Some(now);
        Ok(FailureOutcome::Exhausted)
    }
}

/// A summary could not be saved for a job the worker finished.
///
/// This is terminal regardless of remaining attempts: the worker did its part.
pub fn fail_persistence(job: &mut Job, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
    require_active(job, "fail")?;
    job.status = JobStatus::Failed;
    job.error_message = Some(format!("failed to save summary: {reason}"));
    job.completed_at = Some(now);
    job.updated_at = now;
    Ok(())
}

/// Operator-triggered retry of a FAILED job.
pub fn retry(job: &mut Job, now: DateTime<Utc>) -> DomainResult<()> {
    if job.status != JobStatus::Failed {
        return Err(DomainError::invalid_state(format!(
            "only FAILED jobs can be retried; job {} is {}",
            job.id, job.status
        )));
    }
    if !job.has_attempts_left() {
        return Err(DomainError::invalid_state(format!(
            "job {} has exhausted its {} attempts",
            job.id, job.max_attempts
        )));
    }
    job.status = JobStatus::Queued;
    job.error_message = None;
    job.started_at = None;
    job.completed_at = None;
    job.updated_at = now;
    Ok(())
}

pub fn cancel(job: &mut Job, now: DateTime<Utc>) -> DomainResult<()> {
    require_active(job, "cancel")?;
    job.status = JobStatus::Cancelled;
    job.completed_at = Some(now);
    job.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use synopsi_core::{ArticleId, SummaryKind, SummaryLength, SummaryTarget};

    fn job(max_attempts: u32) -> Job {
        Job::queued(
            SummaryTarget::shared(ArticleId::new()),
            SummaryKind::Brief,
            SummaryLength::Medium,
            max_attempts,
            Utc::now(),
        )
    }

    #[test]
    fn start_records_worker_id_and_start_time() {
        let mut job = job(3);
        let now = Utc::now();
        start(&mut job, Some("w-1".into()), now).unwrap();

        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.started_at, Some(now));
        assert_eq!(job.worker_external_id.as_deref(), Some("w-1"));
        assert!(start(&mut job, None, now).is_err());
    }

    #[test]
    fn acceptance_from_an_earlier_attempt_is_rejected() {
        let mut job = job(3);
        let now = Utc::now();
        // Dispatched at attempt 0, then failed and re-queued before the worker answered.
        fail(&mut job, "boom", now).unwrap();
        assert_eq!(job.attempts, 1);

        let before = job.clone();
        assert!(start_attempt(&mut job, 0, Some("w-old".into()), now).is_err());
        assert_eq!(job, before);

        start_attempt(&mut job, 1, Some("w-new".into()), now).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.worker_external_id.as_deref(), Some("w-new"));
    }

    #[test]
    fn failure_requeues_with_suffix_until_attempts_run_out() {
        let mut job = job(2);
        let now = Utc::now();

        assert_eq!(fail(&mut job, "boom", now).unwrap(), FailureOutcome::Requeued);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.error_message.as_deref(), Some("boom (will retry)"));
        assert!(job.completed_at.is_none());

        assert_eq!(fail(&mut job, "boom", now).unwrap(), FailureOutcome::Exhausted);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert_eq!(job.completed_at, Some(now));
        assert_eq!(job.attempts, 2);
    }

    #[test]
    fn callbacks_on_terminal_jobs_change_nothing() {
        let now = Utc::now();
        let mut done = job(3);
        complete(&mut done, now).unwrap();
        let before = done.clone();

        assert!(matches!(fail(&mut done, "late", now), Err(DomainError::InvalidState(_))));
        assert!(matches!(complete(&mut done, now), Err(DomainError::InvalidState(_))));
        assert!(matches!(cancel(&mut done, now), Err(DomainError::InvalidState(_))));
        assert_eq!(done, before);
    }

    #[test]
    fn retry_requires_failed_status_and_attempts_left() {
        let now = Utc::now();
        let mut queued = job(3);
        assert!(retry(&mut queued, now).is_err());

        // Permanently failed after a persistence error: attempts remain.
        let mut unsaved = job(3);
        fail_persistence(&mut unsaved, "disk full", now).unwrap();
        retry(&mut unsaved, now).unwrap();
        assert_eq!(unsaved.status, JobStatus::Queued);
        assert!(unsaved.error_message.is_none());

        let mut exhausted = job(1);
        fail(&mut exhausted, "boom", now).unwrap();
        assert_eq!(exhausted.status, JobStatus::Failed);
        assert!(matches!(retry(&mut exhausted, now), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn cancel_stops_active_jobs() {
        let now = Utc::now();
        let mut job = job(3);
        cancel(&mut job, now).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.completed_at, Some(now));
    }

    proptest! {
        #[test]
        fn attempts_never_exceed_max(max_attempts in 1u32..8, failures in 0usize..20, retries in 0usize..5) {
            let now = Utc::now();
            let mut job = job(max_attempts);

            for _ in 0..failures {
                let _ = fail(&mut job, "boom", now);
                for _ in 0..retries {
                    let _ = retry(&mut job, now);
                }
                prop_assert!(job.attempts <= job.max_attempts);
            }

            prop_assert!(job.attempts <= job.max_attempts);
            if job.status == JobStatus::Failed {
                prop_assert!(retry(&mut job, now).is_err() || job.attempts < job.max_attempts);
            }
            if job.attempts == job.max_attempts {
                prop_assert_eq!(job.status, JobStatus::Failed);
            }
        }
    }
}
