//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, content directory, worker gateway and sweeps
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the black-box tests).
///
/// With `callback_token` set, worker callbacks must present it.
pub fn build_app(services: Arc<services::AppServices>, callback_token: Option<String>) -> Router {
    let token_state = middleware::WorkerTokenState::new(callback_token);

    let callbacks = routes::callbacks::router().route_layer(
        axum::middleware::from_fn_with_state(token_state, middleware::worker_token_middleware),
    );

    let summaries = routes::router().nest("/callback", callbacks);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/summaries", summaries)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
