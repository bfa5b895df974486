//! Worker ingress: results reported back by the summarization worker.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use synopsi_core::JobId;
use synopsi_infra::jobs::GeneratedSummary;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/complete", post(complete))
        .route("/failure", post(failure))
}

pub async fn start(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::StartCallback>,
) -> axum::response::Response {
    let job_id = match errors::parse_job_id(&body.job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.claim(job_id, body.worker_job_id).await {
        Ok(job) => Json(dto::JobResponse::from(job)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn complete(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CompleteCallback>,
) -> axum::response::Response {
    let job_id = match resolve_job(&services, &body.job).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let result = GeneratedSummary {
        text: body.summary_text,
        model_version: body.model_version,
        token_count: body.token_count,
    };
    match services.jobs.on_success(job_id, result).await {
        Ok(summary) => Json(dto::SummaryResponse::from(summary)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn failure(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::FailureCallback>,
) -> axum::response::Response {
    let job_id = match resolve_job(&services, &body.job).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.on_failure(job_id, &body.error_message).await {
        Ok(job) => Json(dto::JobResponse::from(job)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

/// Our job id wins; otherwise look the job up by the id the worker assigned.
async fn resolve_job(
    services: &AppServices,
    job: &dto::CallbackJobRef,
) -> Result<JobId, axum::response::Response> {
    if let Some(raw) = job.job_id.as_deref() {
        return errors::parse_job_id(raw);
    }
    match job.worker_job_id.as_deref() {
        Some(worker_job_id) => services
            .jobs
            .job_by_worker_external_id(worker_job_id)
            .await
            .map(|job| job.id)
            .map_err(errors::job_error_to_response),
        None => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "either job_id or worker_job_id is required",
        )),
    }
}
