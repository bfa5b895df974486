//! Postgres job store against a real database.
//!
//! Ignored by default. Run with a scratch database:
//! `DATABASE_URL=postgres://... cargo test -p synopsi-infra -- --ignored`

use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use synopsi_core::{
    ArticleId, DEFAULT_MAX_ATTEMPTS, DomainError, Job, JobStatus, Summary, SummaryKind,
    SummaryLength, SummaryTarget, UserId,
};
use synopsi_infra::jobs::transitions;
use synopsi_infra::store::{JobStore, PostgresJobStore, StoreError, completion, mutation};

async fn store() -> PostgresJobStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("failed to connect to Postgres");
    let store = PostgresJobStore::new(pool);
    store.migrate().await.expect("migrations failed");
    store
}

fn queued(target: SummaryTarget) -> Job {
    Job::queued(
        target,
        SummaryKind::Brief,
        SummaryLength::Medium,
        DEFAULT_MAX_ATTEMPTS,
        Utc::now(),
    )
}

fn is_conflict(err: &StoreError) -> bool {
    matches!(err, StoreError::Domain(DomainError::Conflict(_)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs DATABASE_URL"]
async fn concurrent_inserts_leave_one_active_job_per_target() {
    let store = Arc::new(store().await);

    for target in [
        SummaryTarget::shared(ArticleId::new()),
        SummaryTarget::for_user(ArticleId::new(), UserId::new()),
    ] {
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.spawn(async move { store.insert_job(queued(target)).await });
        }

        let mut inserted = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => inserted += 1,
                Err(e) => assert!(is_conflict(&e), "unexpected error: {e}"),
            }
        }
        assert_eq!(inserted, 1);
        assert!(store.find_active_job(target).await.unwrap().is_some());
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn retry_into_an_occupied_target_conflicts() {
    let store = store().await;
    let target = SummaryTarget::shared(ArticleId::new());

    let first = store.insert_job(queued(target)).await.unwrap();
    store
        .update_job(first.id, mutation(|job| transitions::cancel(job, Utc::now())))
        .await
        .unwrap();
    let second = store.insert_job(queued(target)).await.unwrap();

    // Force the cancelled job into FAILED so it is eligible for a retry.
    store
        .update_job(
            first.id,
            mutation(|job| {
                job.status = JobStatus::Failed;
                Ok(())
            }),
        )
        .await
        .unwrap();
    let err = store
        .update_job(first.id, mutation(|job| transitions::retry(job, Utc::now())))
        .await
        .unwrap_err();

    assert!(is_conflict(&err));
    assert_eq!(
        store.get_job(first.id).await.unwrap().unwrap().status,
        JobStatus::Failed
    );
    assert_eq!(
        store.find_active_job(target).await.unwrap().map(|j| j.id),
        Some(second.id)
    );
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn completion_writes_job_and_summary_together() {
    let store = store().await;
    let target = SummaryTarget::shared(ArticleId::new());
    let job = store.insert_job(queued(target)).await.unwrap();

    let (done, summary) = store
        .complete_job(
            job.id,
            completion(|job| {
                let now = Utc::now();
                transitions::complete(job, now)?;
                Ok(Summary::for_job(job, "text", "m1", Some(3), now))
            }),
        )
        .await
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    let found = store
        .find_summary(target, SummaryKind::Brief)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, summary.id);
    assert!(store.find_active_job(target).await.unwrap().is_none());

    // A rejected completion rolls back and writes no summary.
    let err = store
        .complete_job(
            job.id,
            completion(|job| {
                let now = Utc::now();
                transitions::complete(job, now)?;
                Ok(Summary::for_job(job, "again", "m1", None, now))
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::InvalidState(_))));
    assert_eq!(store.list_article_summaries(target.article_id).await.unwrap().len(), 1);
}
