//! Narrow view of the content and identity services.
//!
//! Articles and readers are owned elsewhere; the job lifecycle only needs to know that
//! they exist and to report summarization progress on the article.

use async_trait::async_trait;
use thiserror::Error;

use synopsi_core::{ArticleId, UserId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryContentDirectory;
pub use postgres::PostgresContentDirectory;

/// Summarization progress reported back on an article.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArticleStatus {
    Processing,
    Summarized,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Processing => "PROCESSING",
            ArticleStatus::Summarized => "SUMMARIZED",
            ArticleStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ContentError {
    #[error("article not found: {0}")]
    ArticleNotFound(ArticleId),
    #[error("content service error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ContentDirectory: Send + Sync {
    async fn article_exists(&self, article_id: ArticleId) -> Result<bool, ContentError>;

    async fn user_exists(&self, user_id: UserId) -> Result<bool, ContentError>;

    async fn set_article_status(
        &self,
        article_id: ArticleId,
        status: ArticleStatus,
    ) -> Result<(), ContentError>;
}
