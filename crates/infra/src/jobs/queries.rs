//! Read-only views over jobs and summaries.

use synopsi_core::{
    ArticleId, Job, JobId, JobStats, Summary, SummaryId, SummaryKind, SummaryTarget, UserId,
};

use super::error::JobError;
use super::service::JobService;

/// Largest page accepted by [`JobService::user_summaries`].
pub const MAX_PAGE_SIZE: u32 = 100;

impl JobService {
    pub async fn job(&self, job_id: JobId) -> Result<Job, JobError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("job {job_id}")))
    }

    pub async fn job_by_worker_external_id(&self, worker_job_id: &str) -> Result<Job, JobError> {
        self.store
            .find_by_worker_external_id(worker_job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("job with worker id {worker_job_id}")))
    }

    /// QUEUED jobs in dispatch order: highest priority, then oldest.
    pub async fn queued_jobs(&self) -> Result<Vec<Job>, JobError> {
        Ok(self.store.list_queued().await?)
    }

    pub async fn job_stats(&self) -> Result<JobStats, JobError> {
        Ok(self.store.job_stats().await?)
    }

    /// The reader's own summary if there is one, otherwise the article's default.
    pub async fn summary_for(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<Option<Summary>, JobError> {
        if !target.is_default() {
            if let Some(own) = self.store.find_summary(target, kind).await? {
                return Ok(Some(own));
            }
        }
        self.default_summary(target.article_id, kind).await
    }

    pub async fn default_summary(
        &self,
        article_id: ArticleId,
        kind: SummaryKind,
    ) -> Result<Option<Summary>, JobError> {
        Ok(self
            .store
            .find_summary(SummaryTarget::shared(article_id), kind)
            .await?)
    }

    pub async fn summary(&self, summary_id: SummaryId) -> Result<Summary, JobError> {
        self.store
            .get_summary(summary_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("summary {summary_id}")))
    }

    pub async fn article_summaries(&self, article_id: ArticleId) -> Result<Vec<Summary>, JobError> {
        Ok(self.store.list_article_summaries(article_id).await?)
    }

    /// One zero-based page of a reader's summaries, newest first.
    pub async fn user_summaries(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Vec<Summary>, JobError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(JobError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(self.store.list_user_summaries(user_id, page, size).await?)
    }

    /// Whether a completed summary exists for exactly this target (no default fallback).
    pub async fn summary_exists(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<bool, JobError> {
        Ok(self.store.summary_exists(target, kind).await?)
    }
}
