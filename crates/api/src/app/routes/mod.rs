use axum::Router;

pub mod callbacks;
pub mod jobs;
pub mod summaries;
pub mod system;

/// Everything mounted under `/summaries`, except the worker callbacks.
pub fn router() -> Router {
    summaries::router().nest("/jobs", jobs::router())
}
