//! The job lifecycle service: owns the collaborators and dispatch bookkeeping.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use synopsi_core::{ArticleId, DEFAULT_MAX_ATTEMPTS, Job, JobStatus};

use crate::content::{ArticleStatus, ContentDirectory};
use crate::store::{JobStore, StoreError, mutation};
use crate::worker::{GatewayError, WorkerGateway};

use super::transitions;

/// Tunables for the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    /// Attempts allowed per job before it fails permanently.
    pub max_attempts: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Submits jobs, applies worker callbacks and answers queries.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct JobService {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) content: Arc<dyn ContentDirectory>,
    pub(crate) gateway: Arc<dyn WorkerGateway>,
    pub(crate) settings: JobSettings,
    dispatches: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for JobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        content: Arc<dyn ContentDirectory>,
        gateway: Arc<dyn WorkerGateway>,
        settings: JobSettings,
    ) -> Self {
        Self {
            store,
            content,
            gateway,
            settings,
            dispatches: Mutex::new(JoinSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn settings(&self) -> JobSettings {
        self.settings
    }

    /// Hand a job to the worker without waiting for it.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn dispatch(&self, job: Job) {
        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);

        let mut dispatches = self
            .dispatches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Reap finished dispatches so the set does not grow without bound.
        while dispatches.try_join_next().is_some() {}
        dispatches.spawn(run_dispatch(store, gateway, job));
    }

    /// Wait for every in-flight dispatch to finish.
    pub async fn wait_for_dispatches(&self) {
        loop {
            let mut pending = {
                let mut dispatches = self
                    .dispatches
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                std::mem::take(&mut *dispatches)
            };
            if pending.is_empty() {
                return;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "dispatch task ended abnormally");
                }
            }
        }
    }

    /// Hand a job to the worker and wait for its answer.
    pub(crate) async fn dispatch_and_wait(&self, job: &Job) -> Result<(), GatewayError> {
        dispatch_now(self.store.as_ref(), self.gateway.as_ref(), job).await
    }

    /// Report summarization progress on an article. Failures are logged, not returned.
    pub(crate) async fn mark_article(&self, article_id: ArticleId, status: ArticleStatus) {
        if let Err(e) = self.content.set_article_status(article_id, status).await {
            warn!(
                article_id = %article_id,
                status = status.as_str(),
                error = %e,
                "failed to update article status"
            );
        }
    }
}

async fn run_dispatch(store: Arc<dyn JobStore>, gateway: Arc<dyn WorkerGateway>, job: Job) {
    let job_id = job.id;
    match dispatch_now(store.as_ref(), gateway.as_ref(), &job).await {
        Ok(()) => {}
        Err(GatewayError::NotConfigured) => {
            debug!(job_id = %job_id, status = JobStatus::Queued.as_str(), "job awaiting a worker");
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "dispatch failed; job stays queued");
        }
    }
}

/// Hand `job` to the worker and record the acceptance against the attempt it was sent for.
///
/// Only a gateway refusal is returned; failing to record the acceptance is logged.
async fn dispatch_now(
    store: &dyn JobStore,
    gateway: &dyn WorkerGateway,
    job: &Job,
) -> Result<(), GatewayError> {
    let job_id = job.id;
    let attempt = job.attempts;
    let receipt = gateway.dispatch(job).await?;

    let worker_external_id = receipt.worker_external_id;
    let started = store
        .update_job(
            job_id,
            mutation(move |job| {
                transitions::start_attempt(job, attempt, worker_external_id, Utc::now())
            }),
        )
        .await;
    match started {
        Ok(job) => info!(
            job_id = %job_id,
            worker_job_id = job.worker_external_id.as_deref().unwrap_or(""),
            "job accepted by worker"
        ),
        // The worker answered, the job was cancelled or re-queued before acceptance was recorded.
        Err(StoreError::Domain(e)) => {
            debug!(job_id = %job_id, reason = %e, "job left the queue before acceptance")
        }
        Err(e) => warn!(job_id = %job_id, error = %e, "failed to record worker acceptance"),
    }
    Ok(())
}
