use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Header a worker may use instead of `Authorization: Bearer`.
pub const WORKER_TOKEN_HEADER: &str = "x-worker-token";

#[derive(Debug, Clone)]
pub struct WorkerTokenState {
    token: Option<Arc<str>>,
}

impl WorkerTokenState {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.map(Arc::from),
        }
    }
}

/// Reject callbacks that do not carry the shared worker token. No-op when no token is configured.
pub async fn worker_token_middleware(
    State(state): State<WorkerTokenState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(expected) = state.token.as_deref() {
        let presented = extract_token(req.headers())?;
        if !tokens_match(presented.as_bytes(), expected.as_bytes()) {
            tracing::warn!("worker callback rejected: token mismatch");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    Ok(next.run(req).await)
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn extract_token(headers: &HeaderMap) -> Result<&str, StatusCode> {
    if let Some(header) = headers.get(WORKER_TOKEN_HEADER) {
        let token = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }
        return Ok(token);
    }

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_and_worker_header_are_both_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer s3cret"),
        );
        assert_eq!(extract_token(&headers), Ok("s3cret"));

        let mut headers = HeaderMap::new();
        headers.insert(WORKER_TOKEN_HEADER, HeaderValue::from_static(" s3cret "));
        assert_eq!(extract_token(&headers), Ok("s3cret"));
    }

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(tokens_match(b"s3cret", b"s3cret"));
        assert!(!tokens_match(b"s3cres", b"s3cret"));
        assert!(!tokens_match(b"s3cre", b"s3cret"));
        assert!(!tokens_match(b"", b"s3cret"));
    }

    #[test]
    fn missing_or_blank_token_is_unauthorized() {
        assert_eq!(extract_token(&HeaderMap::new()), Err(StatusCode::UNAUTHORIZED));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc"),
        );
        assert_eq!(extract_token(&headers), Err(StatusCode::UNAUTHORIZED));

        let mut headers = HeaderMap::new();
        headers.insert(WORKER_TOKEN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(extract_token(&headers), Err(StatusCode::UNAUTHORIZED));
    }
}
