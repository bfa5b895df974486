//! Regeneration of an existing summary.

use tracing::{info, instrument};

use synopsi_core::{Job, SummaryId, SummaryTarget};

use super::error::JobError;
use super::service::JobService;

impl JobService {
    /// Submit a fresh job with the parameters of an existing summary.
    ///
    /// The existing summary's regeneration count goes up only when the new job was
    /// accepted; a `Conflict` from submission leaves it unchanged. The new summary is
    /// stored as its own row once the job completes.
    #[instrument(skip(self), fields(summary_id = %summary_id), err)]
    pub async fn regenerate(&self, summary_id: SummaryId) -> Result<Job, JobError> {
        let existing = self
            .store
            .get_summary(summary_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("summary {summary_id}")))?;

        let target = SummaryTarget::new(existing.article_id, existing.user_id);
        let job = self.submit(target, existing.kind, existing.length).await?;

        let summary = self.store.increment_regeneration_count(summary_id).await?;
        info!(
            summary_id = %summary_id,
            job_id = %job.id,
            regeneration_count = summary.regeneration_count,
            "regenerating summary"
        );
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::callbacks::GeneratedSummary;
    use crate::jobs::testing::Harness;
    use crate::store::JobStore;
    use synopsi_core::{Summary, SummaryKind, SummaryLength};

    async fn completed_summary(h: &Harness, target: SummaryTarget) -> Summary {
        let job = h
            .service
            .submit(target, SummaryKind::Detailed, SummaryLength::Long)
            .await
            .unwrap();
        h.service
            .on_success(
                job.id,
                GeneratedSummary {
                    text: "original".into(),
                    model_version: "m1".into(),
                    token_count: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn regenerate_submits_same_parameters_and_counts() {
        let h = Harness::new();
        let target = SummaryTarget::for_user(h.article(), h.user());
        let summary = completed_summary(&h, target).await;

        let job = h.service.regenerate(summary.id).await.unwrap();

        assert_eq!(job.target(), target);
        assert_eq!(job.kind, SummaryKind::Detailed);
        assert_eq!(job.length, SummaryLength::Long);
        let updated = h.store.get_summary(summary.id).await.unwrap().unwrap();
        assert_eq!(updated.regeneration_count, 1);
    }

    #[tokio::test]
    async fn regenerate_conflict_leaves_count_unchanged() {
        let h = Harness::new();
        let target = SummaryTarget::shared(h.article());
        let summary = completed_summary(&h, target).await;

        h.service.regenerate(summary.id).await.unwrap();
        let err = h.service.regenerate(summary.id).await.unwrap_err();

        assert!(matches!(err, JobError::Conflict(_)));
        let updated = h.store.get_summary(summary.id).await.unwrap().unwrap();
        assert_eq!(updated.regeneration_count, 1);
    }

    #[tokio::test]
    async fn regenerating_unknown_summary_is_not_found() {
        let h = Harness::new();
        assert!(matches!(
            h.service.regenerate(SummaryId::new()).await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn completed_regeneration_becomes_the_latest_summary() {
        let h = Harness::new();
        let target = SummaryTarget::shared(h.article());
        let summary = completed_summary(&h, target).await;

        let job = h.service.regenerate(summary.id).await.unwrap();
        h.service
            .on_success(
                job.id,
                GeneratedSummary {
                    text: "refreshed".into(),
                    model_version: "m2".into(),
                    token_count: Some(90),
                },
            )
            .await
            .unwrap();

        let latest = h
            .service
            .summary_for(target, SummaryKind::Detailed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.text, "refreshed");
        assert_eq!(h.store.list_article_summaries(target.article_id).await.unwrap().len(), 2);
    }
}
