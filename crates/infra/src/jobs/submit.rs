//! Job submission.

use chrono::Utc;
use tracing::{info, instrument};

use synopsi_core::{Job, SummaryKind, SummaryLength, SummaryTarget};

use crate::content::ArticleStatus;

use super::error::JobError;
use super::service::JobService;

impl JobService {
    /// Queue a summary generation for `target` and hand it to the worker.
    ///
    /// Fails with `NotFound` for unknown articles or readers and with `Conflict` while
    /// another job for the same target is QUEUED or PROCESSING. The returned job is
    /// already durable; dispatch happens in the background.
    #[instrument(skip(self, target), fields(article_id = %target.article_id), err)]
    pub async fn submit(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
        length: SummaryLength,
    ) -> Result<Job, JobError> {
        if !self.content.article_exists(target.article_id).await? {
            return Err(JobError::NotFound(format!("article {}", target.article_id)));
        }
        if let Some(user_id) = target.user_id {
            if !self.content.user_exists(user_id).await? {
                return Err(JobError::NotFound(format!("user {user_id}")));
            }
        }

        let job = Job::queued(target, kind, length, self.settings.max_attempts, Utc::now());
        let job = self.store.insert_job(job).await?;

        info!(
            job_id = %job.id,
            article_id = %job.article_id,
            user_id = ?job.user_id,
            kind = kind.as_str(),
            priority = job.priority,
            "summary job queued"
        );

        if target.is_default() {
            self.mark_article(target.article_id, ArticleStatus::Processing)
                .await;
        }

        self.dispatch(job.clone());
        Ok(job)
    }
}
