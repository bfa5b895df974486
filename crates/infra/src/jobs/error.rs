//! Errors surfaced by job lifecycle operations.

use thiserror::Error;

use synopsi_core::DomainError;

use crate::content::ContentError;
use crate::store::StoreError;

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("content service error: {0}")]
    Content(String),
}

impl From<DomainError> for JobError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(msg) => JobError::NotFound(msg),
            DomainError::Conflict(msg) => JobError::Conflict(msg),
            DomainError::InvalidState(msg) => JobError::InvalidState(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                JobError::Validation(msg)
            }
        }
    }
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(domain) => domain.into(),
            StoreError::Storage(msg) => JobError::Store(msg),
        }
    }
}

impl From<ContentError> for JobError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::ArticleNotFound(id) => JobError::NotFound(format!("article {id}")),
            ContentError::Backend(msg) => JobError::Content(msg),
        }
    }
}
