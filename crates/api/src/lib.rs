//! HTTP API for summary jobs: routing, worker ingress and request/response mapping.

pub mod app;
pub mod middleware;
