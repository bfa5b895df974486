//! Service wiring: stores, content directory and worker gateway behind the job service.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use synopsi_infra::config::AppConfig;
use synopsi_infra::content::{ContentDirectory, InMemoryContentDirectory, PostgresContentDirectory};
use synopsi_infra::jobs::{
    JobService, JobSettings, RetentionSweeper, StaleJobReaper, SweepHandle, SweepSchedule,
    spawn_sweep,
};
use synopsi_infra::store::{InMemoryJobStore, JobStore, PostgresJobStore};
use synopsi_infra::worker::{HttpWorkerGateway, UnconfiguredWorkerGateway, WorkerGateway};

/// Everything request handlers need.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub jobs: Arc<JobService>,
}

impl AppServices {
    pub fn new(jobs: Arc<JobService>) -> Self {
        Self { jobs }
    }

    /// Start the stale-job reaper and the retention sweeper.
    pub fn spawn_sweeps(&self, config: &AppConfig) -> anyhow::Result<Vec<SweepHandle>> {
        let stale_after = chrono::Duration::from_std(config.stale_job_timeout)
            .context("STALE_JOB_TIMEOUT_SECS out of range")?;
        let retention = chrono::Duration::from_std(config.job_retention)
            .context("JOB_RETENTION_DAYS out of range")?;

        let reaper = Arc::new(StaleJobReaper::new(self.jobs.clone(), stale_after));
        let sweeper = Arc::new(RetentionSweeper::new(self.jobs.store().clone(), retention));

        Ok(vec![
            spawn_sweep(reaper, SweepSchedule::every(config.reaper_interval)),
            spawn_sweep(sweeper, SweepSchedule::every(config.retention_interval)),
        ])
    }
}

/// Build services from configuration.
///
/// With `USE_PERSISTENT_STORES=true` jobs, summaries and the content lookups go to
/// Postgres (migrations are applied on startup); otherwise everything is in memory and,
/// unless `CONTENT_ACCEPT_ANY=false`, every article and reader id is accepted.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let (store, content): (Arc<dyn JobStore>, Arc<dyn ContentDirectory>) =
        if config.use_persistent_stores {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to Postgres")?;

            let store = PostgresJobStore::new(pool.clone());
            store.migrate().await.context("failed to run migrations")?;
            tracing::info!("using Postgres job store");

            let content: Arc<dyn ContentDirectory> = Arc::new(PostgresContentDirectory::new(pool));
            (Arc::new(store), content)
        } else {
            tracing::warn!("using in-memory stores; jobs and summaries are lost on restart");
            let store: Arc<dyn JobStore> = InMemoryJobStore::arc();
            let content: Arc<dyn ContentDirectory> = if config.content_accept_any {
                tracing::info!("in-memory content directory accepts any article or user id");
                Arc::new(InMemoryContentDirectory::accepting_any())
            } else {
                InMemoryContentDirectory::arc()
            };
            (store, content)
        };

    let gateway: Arc<dyn WorkerGateway> = match &config.worker.url {
        Some(url) => {
            tracing::info!(worker_url = %url, "dispatching jobs over HTTP");
            Arc::new(
                HttpWorkerGateway::new(url.clone(), config.worker.timeout)
                    .context("failed to build worker gateway")?,
            )
        }
        None => {
            tracing::warn!("WORKER_URL not set; jobs stay queued until a worker polls for them");
            Arc::new(UnconfiguredWorkerGateway)
        }
    };

    let jobs = JobService::new(
        store,
        content,
        gateway,
        JobSettings {
            max_attempts: config.max_attempts,
        },
    );
    Ok(AppServices::new(Arc::new(jobs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use synopsi_core::{ArticleId, JobStatus, SummaryKind, SummaryLength, SummaryTarget, UserId};
    use synopsi_infra::jobs::JobError;

    #[tokio::test]
    async fn default_config_runs_jobs_for_any_article() {
        let services = build_services(&AppConfig::default()).await.unwrap();

        let job = services
            .jobs
            .submit(
                SummaryTarget::for_user(ArticleId::new(), UserId::new()),
                SummaryKind::Brief,
                SummaryLength::Medium,
            )
            .await
            .unwrap();
        services.jobs.wait_for_dispatches().await;

        // No worker configured: the job waits for a pull-based worker.
        assert_eq!(services.jobs.job(job.id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn strict_content_rejects_unknown_articles() {
        let config = AppConfig {
            content_accept_any: false,
            ..AppConfig::default()
        };
        let services = build_services(&config).await.unwrap();

        let err = services
            .jobs
            .submit(
                SummaryTarget::shared(ArticleId::new()),
                SummaryKind::Brief,
                SummaryLength::Medium,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }
}
