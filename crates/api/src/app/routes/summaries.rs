use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use synopsi_core::SummaryTarget;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/request", post(request_summary))
        .route("/exists", get(summary_exists))
        .route("/:id", get(get_summary))
        .route("/:id/regenerate", post(regenerate_summary))
        .route("/article/:id", get(summary_for_article))
        .route("/article/:id/default", get(default_summary))
        .route("/article/:id/all", get(article_summaries))
        .route("/user/:id", get(user_summaries))
}

pub async fn request_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SummaryRequest>,
) -> axum::response::Response {
    let article_id = match errors::parse_article_id(&body.article_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let user_id = match errors::parse_optional_user_id(body.user_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind = match errors::parse_summary_kind(body.summary_type.as_deref()) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let length = match errors::parse_summary_length(body.summary_length.as_deref()) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    match services
        .jobs
        .submit(SummaryTarget::new(article_id, user_id), kind, length)
        .await
    {
        Ok(job) => (StatusCode::ACCEPTED, Json(dto::JobResponse::from(job))).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn get_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let summary_id = match errors::parse_summary_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.summary(summary_id).await {
        Ok(summary) => Json(dto::SummaryResponse::from(summary)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn regenerate_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let summary_id = match errors::parse_summary_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.regenerate(summary_id).await {
        Ok(job) => (StatusCode::ACCEPTED, Json(dto::JobResponse::from(job))).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

/// The reader's summary when `user_id` is given and one exists, else the default one.
pub async fn summary_for_article(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::SummaryLookupQuery>,
) -> axum::response::Response {
    let article_id = match errors::parse_article_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let user_id = match errors::parse_optional_user_id(query.user_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind = match errors::parse_summary_kind(query.summary_type.as_deref()) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services
        .jobs
        .summary_for(SummaryTarget::new(article_id, user_id), kind)
        .await
    {
        Ok(Some(summary)) => Json(dto::SummaryResponse::from(summary)).into_response(),
        Ok(None) => errors::not_found(format!("no summary for article {article_id}")),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn default_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::SummaryLookupQuery>,
) -> axum::response::Response {
    let article_id = match errors::parse_article_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind = match errors::parse_summary_kind(query.summary_type.as_deref()) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.jobs.default_summary(article_id, kind).await {
        Ok(Some(summary)) => Json(dto::SummaryResponse::from(summary)).into_response(),
        Ok(None) => errors::not_found(format!("no default summary for article {article_id}")),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn article_summaries(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let article_id = match errors::parse_article_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.article_summaries(article_id).await {
        Ok(summaries) => Json(dto::summaries_to_json(summaries)).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn user_summaries(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(page): Query<dto::PageQuery>,
) -> axum::response::Response {
    let user_id = match errors::parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.user_summaries(user_id, page.page, page.size).await {
        Ok(summaries) => Json(dto::PageResponse {
            items: dto::summaries_to_json(summaries),
            page: page.page,
            size: page.size,
        })
        .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn summary_exists(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ExistsQuery>,
) -> axum::response::Response {
    let article_id = match errors::parse_article_id(&query.article_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let user_id = match errors::parse_optional_user_id(query.user_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind = match errors::parse_summary_kind(query.summary_type.as_deref()) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services
        .jobs
        .summary_exists(SummaryTarget::new(article_id, user_id), kind)
        .await
    {
        Ok(exists) => Json(serde_json::json!({ "exists": exists })).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
