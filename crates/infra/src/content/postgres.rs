//! Content directory over the content service's `articles` and `users` tables.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use synopsi_core::{ArticleId, UserId};

use super::{ArticleStatus, ContentDirectory, ContentError};

#[derive(Debug, Clone)]
pub struct PostgresContentDirectory {
    pool: Arc<PgPool>,
}

impl PostgresContentDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn exists(&self, sql: &str, id: &uuid::Uuid) -> Result<bool, ContentError> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_one(&*self.pool)
            .await
            .map_err(backend)?;
        row.try_get("present").map_err(backend)
    }
}

fn backend(err: sqlx::Error) -> ContentError {
    ContentError::Backend(err.to_string())
}

#[async_trait]
impl ContentDirectory for PostgresContentDirectory {
    #[instrument(skip(self), err)]
    async fn article_exists(&self, article_id: ArticleId) -> Result<bool, ContentError> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM articles WHERE id = $1) AS present",
            article_id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn user_exists(&self, user_id: UserId) -> Result<bool, ContentError> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1) AS present",
            user_id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn set_article_status(
        &self,
        article_id: ArticleId,
        status: ArticleStatus,
    ) -> Result<(), ContentError> {
        let result = sqlx::query("UPDATE articles SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(article_id.as_uuid())
            .bind(status.as_str())
            .execute(&*self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(ContentError::ArticleNotFound(article_id));
        }
        Ok(())
    }
}
