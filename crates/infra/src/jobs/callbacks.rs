//! Worker callbacks and operator actions on existing jobs.
//!
//! Every status change funnels through [`super::transitions`] inside a locked store
//! update, so concurrent callbacks for the same job are serialized.

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use synopsi_core::{Job, JobId, JobStatus, Summary};

use crate::content::ArticleStatus;
use crate::store::{StoreError, completion, mutation};

use super::error::JobError;
use super::service::JobService;
use super::transitions;

/// Result text reported by the worker for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSummary {
    pub text: String,
    pub model_version: String,
    pub token_count: Option<i32>,
}

impl JobService {
    /// A pull-based worker takes a QUEUED job: it becomes PROCESSING, so the stale-job
    /// reaper times it out if no result follows.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn claim(
        &self,
        job_id: JobId,
        worker_job_id: Option<String>,
    ) -> Result<Job, JobError> {
        let job = self
            .store
            .update_job(
                job_id,
                mutation(move |job| transitions::start(job, worker_job_id, Utc::now())),
            )
            .await?;
        info!(
            job_id = %job.id,
            worker_job_id = job.worker_external_id.as_deref().unwrap_or(""),
            "job claimed by worker"
        );
        Ok(job)
    }

    /// The worker produced a summary: persist it and complete the job atomically.
    ///
    /// When the summary cannot be saved the job is marked FAILED instead and the
    /// storage error is returned.
    #[instrument(skip(self, result), fields(job_id = %job_id), err)]
    pub async fn on_success(
        &self,
        job_id: JobId,
        result: GeneratedSummary,
    ) -> Result<Summary, JobError> {
        let now = Utc::now();
        let GeneratedSummary {
            text,
            model_version,
            token_count,
        } = result;

        let completed = self
            .store
            .complete_job(
                job_id,
                completion(move |job| {
                    transitions::complete(job, now)?;
                    Ok(Summary::for_job(job, text, model_version, token_count, now))
                }),
            )
            .await;

        match completed {
            Ok((job, summary)) => {
                info!(
                    job_id = %job.id,
                    summary_id = %summary.id,
                    attempts = job.attempts,
                    "summary job completed"
                );
                if job.is_default() {
                    self.mark_article(job.article_id, ArticleStatus::Summarized)
                        .await;
                }
                Ok(summary)
            }
            Err(StoreError::Storage(reason)) => {
                error!(job_id = %job_id, error = %reason, "failed to save summary");
                let failed = self
                    .store
                    .update_job(
                        job_id,
                        mutation({
                            let reason = reason.clone();
                            move |job| transitions::fail_persistence(job, &reason, Utc::now())
                        }),
                    )
                    .await?;
                if failed.is_default() {
                    self.mark_article(failed.article_id, ArticleStatus::Failed)
                        .await;
                }
                Err(JobError::Store(reason))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The worker (or the stale-job reaper) reports a failed attempt.
    ///
    /// The job is re-queued and re-dispatched while attempts remain; otherwise it
    /// fails permanently and a default job's article is marked failed.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn on_failure(&self, job_id: JobId, error_message: &str) -> Result<Job, JobError> {
        let message = error_message.to_string();
        let job = self
            .store
            .update_job(
                job_id,
                mutation(move |job| {
                    transitions::fail(job, &message, Utc::now()).map(|_| ())
                }),
            )
            .await?;

        if job.status == JobStatus::Queued {
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                error = error_message,
                "summary job failed; retrying"
            );
            self.dispatch(job.clone());
        } else {
            error!(
                job_id = %job.id,
                attempts = job.attempts,
                error = error_message,
                "summary job failed permanently"
            );
            if job.is_default() {
                self.mark_article(job.article_id, ArticleStatus::Failed)
                    .await;
            }
        }
        Ok(job)
    }

    /// Put a FAILED job with attempts left back in the queue.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn retry_failed(&self, job_id: JobId) -> Result<Job, JobError> {
        let job = self
            .store
            .update_job(job_id, mutation(|job| transitions::retry(job, Utc::now())))
            .await?;

        info!(job_id = %job.id, attempts = job.attempts, "retrying failed job");
        if job.is_default() {
            self.mark_article(job.article_id, ArticleStatus::Processing)
                .await;
        }
        self.dispatch(job.clone());
        Ok(job)
    }

    /// Stop a QUEUED or PROCESSING job.
    ///
    /// A later callback for the job is rejected with `InvalidState`.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn cancel(&self, job_id: JobId) -> Result<Job, JobError> {
        let job = self
            .store
            .update_job(job_id, mutation(|job| transitions::cancel(job, Utc::now())))
            .await?;
        info!(job_id = %job.id, "summary job cancelled");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::DateTime;

    use crate::jobs::service::JobSettings;
    use crate::jobs::testing::Harness;
    use crate::store::{CompletionMutation, InMemoryJobStore, JobMutation, JobStore};
    use synopsi_core::{
        ArticleId, JobStats, SummaryId, SummaryKind, SummaryLength, SummaryStatus, SummaryTarget,
        UserId,
    };

    /// In-memory store whose summary writes always fail.
    struct SummaryWriteFails {
        inner: Arc<InMemoryJobStore>,
    }

    #[async_trait]
    impl JobStore for SummaryWriteFails {
        async fn insert_job(&self, job: Job) -> Result<Job, StoreError> {
            self.inner.insert_job(job).await
        }

        async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
            self.inner.get_job(id).await
        }

        async fn find_active_job(&self, target: SummaryTarget) -> Result<Option<Job>, StoreError> {
            self.inner.find_active_job(target).await
        }

        async fn find_by_worker_external_id(&self, id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.find_by_worker_external_id(id).await
        }

        async fn update_job(&self, id: JobId, mutation: JobMutation) -> Result<Job, StoreError> {
            self.inner.update_job(id, mutation).await
        }

        async fn complete_job(
            &self,
            _id: JobId,
            _mutation: CompletionMutation,
        ) -> Result<(Job, Summary), StoreError> {
            Err(StoreError::Storage("disk full".to_string()))
        }

        async fn list_queued(&self) -> Result<Vec<Job>, StoreError> {
            self.inner.list_queued().await
        }

        async fn list_stale_processing(&self, before: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
            self.inner.list_stale_processing(before).await
        }

        async fn list_stranded_queued(&self, before: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
            self.inner.list_stranded_queued(before).await
        }

        async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.delete_completed_before(cutoff).await
        }

        async fn job_stats(&self) -> Result<JobStats, StoreError> {
            self.inner.job_stats().await
        }

        async fn get_summary(&self, id: SummaryId) -> Result<Option<Summary>, StoreError> {
            self.inner.get_summary(id).await
        }

        async fn find_summary(
            &self,
            target: SummaryTarget,
            kind: SummaryKind,
        ) -> Result<Option<Summary>, StoreError> {
            self.inner.find_summary(target, kind).await
        }

        async fn list_article_summaries(&self, id: ArticleId) -> Result<Vec<Summary>, StoreError> {
            self.inner.list_article_summaries(id).await
        }

        async fn list_user_summaries(
            &self,
            user_id: UserId,
            page: u32,
            size: u32,
        ) -> Result<Vec<Summary>, StoreError> {
            self.inner.list_user_summaries(user_id, page, size).await
        }

        async fn summary_exists(
            &self,
            target: SummaryTarget,
            kind: SummaryKind,
        ) -> Result<bool, StoreError> {
            self.inner.summary_exists(target, kind).await
        }

        async fn increment_regeneration_count(&self, id: SummaryId) -> Result<Summary, StoreError> {
            self.inner.increment_regeneration_count(id).await
        }
    }

    fn generated(text: &str) -> GeneratedSummary {
        GeneratedSummary {
            text: text.to_string(),
            model_version: "bart-large-cnn".to_string(),
            token_count: Some(120),
        }
    }

    async fn submit_default(h: &Harness) -> Job {
        let target = SummaryTarget::shared(h.article());
        h.service
            .submit(target, SummaryKind::Brief, SummaryLength::Medium)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn success_creates_summary_and_completes_job() {
        let h = Harness::new();
        let job = submit_default(&h).await;

        let summary = h.service.on_success(job.id, generated("short text")).await.unwrap();

        let stored = h.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(summary.status, SummaryStatus::Completed);
        assert_eq!(summary.regeneration_count, 0);
        assert_eq!(summary.text, "short text");
        assert_eq!(summary.kind, SummaryKind::Brief);
        assert_eq!(h.article_status(job.article_id), Some(ArticleStatus::Summarized));
        assert!(
            h.store
                .summary_exists(job.target(), SummaryKind::Brief)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn user_job_success_does_not_touch_article_status() {
        let h = Harness::new();
        let article = h.article();
        let user = h.user();
        let job = h
            .service
            .submit(SummaryTarget::for_user(article, user), SummaryKind::List, SummaryLength::Long)
            .await
            .unwrap();

        h.service.on_success(job.id, generated("- a\n- b")).await.unwrap();

        assert_eq!(h.article_status(article), None);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let h = Harness::new();
        let missing = JobId::new();

        assert!(matches!(
            h.service.on_success(missing, generated("x")).await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            h.service.on_failure(missing, "boom").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failures_retry_then_fail_permanently() {
        let h = Harness::new();
        let job = submit_default(&h).await;

        let first = h.service.on_failure(job.id, "model crashed").await.unwrap();
        assert_eq!(first.status, JobStatus::Queued);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.error_message.as_deref(), Some("model crashed (will retry)"));

        h.service.on_failure(job.id, "model crashed").await.unwrap();
        let last = h.service.on_failure(job.id, "model crashed").await.unwrap();
        h.service.wait_for_dispatches().await;

        assert_eq!(last.status, JobStatus::Failed);
        assert_eq!(last.attempts, 3);
        assert_eq!(last.error_message.as_deref(), Some("model crashed"));
        assert!(last.completed_at.is_some());
        assert_eq!(h.article_status(job.article_id), Some(ArticleStatus::Failed));
        // Initial dispatch plus one per retry.
        assert_eq!(h.gateway.dispatch_count(job.id), 3);

        let err = h.service.on_failure(job.id, "late").await.unwrap_err();
        assert!(matches!(err, JobError::InvalidState(_)));
        assert_eq!(h.store.get_job(job.id).await.unwrap().unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn callback_after_completion_is_rejected() {
        let h = Harness::new();
        let job = submit_default(&h).await;
        h.service.on_success(job.id, generated("first")).await.unwrap();

        let again = h.service.on_success(job.id, generated("second")).await.unwrap_err();
        let failure = h.service.on_failure(job.id, "late").await.unwrap_err();

        assert!(matches!(again, JobError::InvalidState(_)));
        assert!(matches!(failure, JobError::InvalidState(_)));
        assert_eq!(h.store.list_article_summaries(job.article_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_requeues_failed_job_with_attempts_left() {
        let h = Harness::with_settings(JobSettings { max_attempts: 3 });
        let job = submit_default(&h).await;

        // Operator-visible failure with attempts left: a summary that could not be saved.
        let mut failed = h.store.get_job(job.id).await.unwrap().unwrap();
        failed.status = JobStatus::Failed;
        failed.attempts = 1;
        failed.error_message = Some("failed to save summary: disk full".into());
        h.store.put_job(failed).unwrap();

        let retried = h.service.retry_failed(job.id).await.unwrap();
        h.service.wait_for_dispatches().await;

        assert_eq!(retried.status, JobStatus::Queued);
        assert!(retried.error_message.is_none());
        assert_eq!(retried.attempts, 1);
        assert_eq!(h.gateway.dispatch_count(job.id), 2);
    }

    #[tokio::test]
    async fn retry_rejects_non_failed_and_exhausted_jobs() {
        let h = Harness::with_settings(JobSettings { max_attempts: 1 });
        let job = submit_default(&h).await;

        assert!(matches!(
            h.service.retry_failed(job.id).await,
            Err(JobError::InvalidState(_))
        ));

        h.service.on_failure(job.id, "boom").await.unwrap();
        assert!(matches!(
            h.service.retry_failed(job.id).await,
            Err(JobError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn retry_conflicts_when_target_has_a_newer_active_job() {
        let h = Harness::with_settings(JobSettings { max_attempts: 3 });
        let job = submit_default(&h).await;
        let mut failed = h.store.get_job(job.id).await.unwrap().unwrap();
        failed.status = JobStatus::Failed;
        h.store.put_job(failed).unwrap();

        h.service
            .submit(job.target(), SummaryKind::Brief, SummaryLength::Medium)
            .await
            .unwrap();

        assert!(matches!(
            h.service.retry_failed(job.id).await,
            Err(JobError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_job_ignores_late_callbacks() {
        let h = Harness::new();
        let job = submit_default(&h).await;

        let cancelled = h.service.cancel(job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        assert!(matches!(
            h.service.on_success(job.id, generated("late")).await,
            Err(JobError::InvalidState(_))
        ));
        assert!(matches!(h.service.cancel(job.id).await, Err(JobError::InvalidState(_))));
        assert!(h.store.list_article_summaries(job.article_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsaved_summary_fails_job_and_default_article() {
        let h = Harness::new();
        let service = JobService::new(
            Arc::new(SummaryWriteFails {
                inner: h.store.clone(),
            }),
            h.content.clone(),
            h.gateway.clone(),
            JobSettings::default(),
        );
        let article = h.article();
        let job = service
            .submit(SummaryTarget::shared(article), SummaryKind::Brief, SummaryLength::Medium)
            .await
            .unwrap();
        service.wait_for_dispatches().await;

        let err = service.on_success(job.id, generated("lost")).await.unwrap_err();

        assert!(matches!(err, JobError::Store(ref reason) if reason == "disk full"));
        let stored = h.store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("failed to save summary: disk full")
        );
        assert!(h.store.list_article_summaries(article).await.unwrap().is_empty());
        assert_eq!(h.article_status(article), Some(ArticleStatus::Failed));
    }

    #[tokio::test]
    async fn pull_worker_claims_queued_job() {
        let h = Harness::new();
        h.gateway.fail_with("no push worker");
        let job = submit_default(&h).await;
        h.service.wait_for_dispatches().await;
        assert_eq!(
            h.store.get_job(job.id).await.unwrap().unwrap().status,
            JobStatus::Queued
        );

        let claimed = h.service.claim(job.id, Some("pull-7".into())).await.unwrap();

        assert_eq!(claimed.status, JobStatus::Processing);
        assert!(claimed.started_at.is_some());
        assert_eq!(claimed.worker_external_id.as_deref(), Some("pull-7"));
        assert!(matches!(
            h.service.claim(job.id, None).await,
            Err(JobError::InvalidState(_))
        ));
        assert_eq!(
            h.service.job_by_worker_external_id("pull-7").await.unwrap().id,
            job.id
        );
    }
}
