//! Persistence for jobs and summaries.
//!
//! ## Design
//!
//! - At most one QUEUED/PROCESSING job per (article, user) target, enforced by the store
//! - Job status changes go through [`JobStore::update_job`]: the store locks the row,
//!   runs the mutation and persists the result in one atomic step
//! - Completing a job and inserting its summary happen together or not at all
//!
//! Two implementations: [`InMemoryJobStore`] for tests/dev and [`PostgresJobStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use synopsi_core::{
    ArticleId, DomainError, Job, JobId, JobStats, Summary, SummaryId, SummaryKind, SummaryTarget,
    UserId,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;

/// Mutation applied to a locked job row.
///
/// Returning an error aborts the update and leaves the row untouched.
pub type JobMutation = Box<dyn FnOnce(&mut Job) -> Result<(), DomainError> + Send>;

/// Mutation that completes a locked job and yields the summary to persist with it.
pub type CompletionMutation = Box<dyn FnOnce(&mut Job) -> Result<Summary, DomainError> + Send>;

/// Box a closure as a [`JobMutation`].
pub fn mutation<F>(f: F) -> JobMutation
where
    F: FnOnce(&mut Job) -> Result<(), DomainError> + Send + 'static,
{
    Box::new(f)
}

/// Box a closure as a [`CompletionMutation`].
pub fn completion<F>(f: F) -> CompletionMutation
where
    F: FnOnce(&mut Job) -> Result<Summary, DomainError> + Send + 'static,
{
    Box::new(f)
}

/// Store error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::not_found(msg))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::conflict(msg))
    }
}

/// Job and summary persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    ///
    /// Fails with `Conflict` when an active job already exists for the job's target.
    async fn insert_job(&self, job: Job) -> Result<Job, StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// The QUEUED or PROCESSING job for a target, if any.
    async fn find_active_job(&self, target: SummaryTarget) -> Result<Option<Job>, StoreError>;

    async fn find_by_worker_external_id(
        &self,
        worker_external_id: &str,
    ) -> Result<Option<Job>, StoreError>;

    /// Lock the job, apply `mutation` and persist the result.
    ///
    /// Fails with `NotFound` for unknown ids, with whatever the mutation returns, and with
    /// `Conflict` if the job becomes active while another active job owns its target.
    async fn update_job(&self, id: JobId, mutation: JobMutation) -> Result<Job, StoreError>;

    /// Lock the job, apply `mutation` and insert the returned summary in the same
    /// transaction.
    async fn complete_job(
        &self,
        id: JobId,
        mutation: CompletionMutation,
    ) -> Result<(Job, Summary), StoreError>;

    /// QUEUED jobs, highest priority first, then oldest submission first.
    async fn list_queued(&self) -> Result<Vec<Job>, StoreError>;

    /// PROCESSING jobs whose `started_at` is before `started_before`.
    async fn list_stale_processing(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError>;

    /// QUEUED jobs not touched since `updated_before`, in dispatch order.
    async fn list_stranded_queued(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError>;

    /// Delete COMPLETED jobs whose `completed_at` is before `cutoff`. Returns the count.
    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn job_stats(&self) -> Result<JobStats, StoreError>;

    async fn get_summary(&self, id: SummaryId) -> Result<Option<Summary>, StoreError>;

    /// Most recently generated summary for a target and kind.
    async fn find_summary(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<Option<Summary>, StoreError>;

    /// Every summary of an article, newest first.
    async fn list_article_summaries(
        &self,
        article_id: ArticleId,
    ) -> Result<Vec<Summary>, StoreError>;

    /// One page of a reader's summaries, newest first. `page` is zero-based.
    async fn list_user_summaries(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Vec<Summary>, StoreError>;

    async fn summary_exists(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<bool, StoreError>;

    /// Bump `regeneration_count` on a summary and return the updated row.
    async fn increment_regeneration_count(&self, id: SummaryId) -> Result<Summary, StoreError>;
}
