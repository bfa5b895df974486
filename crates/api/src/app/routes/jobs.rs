use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/queued", get(queued_jobs))
        .route("/statistics", get(job_statistics))
        .route("/:id", get(get_job))
        .route("/:id/retry", post(retry_job))
        .route("/:id/cancel", post(cancel_job))
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match errors::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.job(job_id).await {
        Ok(job) => Json(dto::JobResponse::from(job)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn queued_jobs(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.jobs.queued_jobs().await {
        Ok(jobs) => Json(
            jobs.into_iter()
                .map(dto::JobResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn job_statistics(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.jobs.job_stats().await {
        Ok(stats) => Json(dto::JobStatsResponse::from(stats)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn retry_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match errors::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.retry_failed(job_id).await {
        Ok(job) => Json(dto::JobResponse::from(job)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match errors::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.cancel(job_id).await {
        Ok(job) => Json(dto::JobResponse::from(job)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
