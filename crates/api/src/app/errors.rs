use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use synopsi_core::{ArticleId, JobId, SummaryId, SummaryKind, SummaryLength, UserId};
use synopsi_infra::jobs::JobError;

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        JobError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        JobError::InvalidState(msg) => json_error(StatusCode::CONFLICT, "invalid_state", msg),
        JobError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        JobError::Store(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
        JobError::Content(msg) => json_error(StatusCode::BAD_GATEWAY, "content_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn not_found(what: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", what)
}

fn invalid_id(field: &str, raw: &str) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_id",
        format!("{field} must be a UUID (got {raw:?})"),
    )
}

pub fn parse_article_id(raw: &str) -> Result<ArticleId, axum::response::Response> {
    raw.parse().map_err(|_| invalid_id("article id", raw))
}

pub fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse().map_err(|_| invalid_id("user id", raw))
}

pub fn parse_job_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse().map_err(|_| invalid_id("job id", raw))
}

pub fn parse_summary_id(raw: &str) -> Result<SummaryId, axum::response::Response> {
    raw.parse().map_err(|_| invalid_id("summary id", raw))
}

pub fn parse_optional_user_id(
    raw: Option<&str>,
) -> Result<Option<UserId>, axum::response::Response> {
    raw.filter(|s| !s.trim().is_empty())
        .map(parse_user_id)
        .transpose()
}

/// Parse an optional summary type, defaulting to BRIEF.
pub fn parse_summary_kind(raw: Option<&str>) -> Result<SummaryKind, axum::response::Response> {
    match raw {
        None => Ok(SummaryKind::default()),
        Some(s) => s.parse().map_err(|e: synopsi_core::DomainError| {
            json_error(StatusCode::BAD_REQUEST, "invalid_summary_type", e.to_string())
        }),
    }
}

/// Parse an optional summary length, defaulting to MEDIUM.
pub fn parse_summary_length(
    raw: Option<&str>,
) -> Result<SummaryLength, axum::response::Response> {
    match raw {
        None => Ok(SummaryLength::default()),
        Some(s) => s.parse().map_err(|e: synopsi_core::DomainError| {
            json_error(StatusCode::BAD_REQUEST, "invalid_summary_length", e.to_string())
        }),
    }
}
