//! Hand-off of jobs to the external summarization worker.
//!
//! Dispatch is fire-and-forget from the lifecycle's point of view: an accepted
//! dispatch only means the worker has the job. Results come back later through
//! the callback endpoints.

use async_trait::async_trait;
use thiserror::Error;

use synopsi_core::Job;

pub mod http;
pub mod recording;

pub use http::HttpWorkerGateway;
pub use recording::RecordingWorkerGateway;

/// What the worker said when it accepted a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// Worker-side correlation id, when the worker hands one out.
    pub worker_external_id: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("no worker configured")]
    NotConfigured,
    #[error("worker unreachable: {0}")]
    Transport(String),
    #[error("worker rejected job: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait WorkerGateway: Send + Sync {
    async fn dispatch(&self, job: &Job) -> Result<DispatchReceipt, GatewayError>;
}

/// Gateway used when no worker URL is configured.
///
/// Jobs stay QUEUED; a pull-based worker picks them up from the queued-jobs
/// listing and claims one with [`crate::jobs::JobService::claim`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredWorkerGateway;

#[async_trait]
impl WorkerGateway for UnconfiguredWorkerGateway {
    async fn dispatch(&self, job: &Job) -> Result<DispatchReceipt, GatewayError> {
        tracing::debug!(job_id = %job.id, "no worker configured; job left queued");
        Err(GatewayError::NotConfigured)
    }
}
