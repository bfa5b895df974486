//! HTTP worker gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use synopsi_core::{ArticleId, Job, JobId, SummaryKind, SummaryLength, UserId};

use super::{DispatchReceipt, GatewayError, WorkerGateway};

/// Job payload posted to `{base_url}/jobs`.
#[derive(Debug, Serialize)]
struct DispatchRequest {
    job_id: JobId,
    article_id: ArticleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    summary_type: SummaryKind,
    summary_length: SummaryLength,
    priority: i32,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    #[serde(default)]
    worker_job_id: Option<String>,
}

/// Posts jobs to the worker service.
#[derive(Debug, Clone)]
pub struct HttpWorkerGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpWorkerGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl WorkerGateway for HttpWorkerGateway {
    async fn dispatch(&self, job: &Job) -> Result<DispatchReceipt, GatewayError> {
        let request = DispatchRequest {
            job_id: job.id,
            article_id: job.article_id,
            user_id: job.user_id,
            summary_type: job.kind,
            summary_length: job.length,
            priority: job.priority,
        };

        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {body}")));
        }

        // Workers that do not hand out their own id may answer with an empty body.
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let worker_external_id = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<DispatchResponse>(&body)
                .map_err(|e| GatewayError::Rejected(format!("unreadable worker response: {e}")))?
                .worker_job_id
        };

        Ok(DispatchReceipt { worker_external_id })
    }
}
