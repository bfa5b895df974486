//! In-memory content directory for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use synopsi_core::{ArticleId, UserId};

use super::{ArticleStatus, ContentDirectory, ContentError};

#[derive(Debug, Default)]
struct Directory {
    /// Known articles and the last reported status, if any.
    articles: HashMap<ArticleId, Option<ArticleStatus>>,
    users: HashSet<UserId>,
    /// Treat every id as known, registering it on first sight.
    accept_any: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryContentDirectory {
    inner: Mutex<Directory>,
}

impl InMemoryContentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// A directory that knows every article and reader, for running without the
    /// content service.
    pub fn accepting_any() -> Self {
        Self {
            inner: Mutex::new(Directory {
                accept_any: true,
                ..Directory::default()
            }),
        }
    }

    pub fn add_article(&self, article_id: ArticleId) -> Result<(), ContentError> {
        self.lock()?.articles.entry(article_id).or_insert(None);
        Ok(())
    }

    pub fn add_user(&self, user_id: UserId) -> Result<(), ContentError> {
        self.lock()?.users.insert(user_id);
        Ok(())
    }

    /// Last status reported for an article.
    pub fn article_status(&self, article_id: ArticleId) -> Result<Option<ArticleStatus>, ContentError> {
        Ok(self.lock()?.articles.get(&article_id).copied().flatten())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Directory>, ContentError> {
        self.inner
            .lock()
            .map_err(|_| ContentError::Backend("content directory lock poisoned".to_string()))
    }
}

#[async_trait]
impl ContentDirectory for InMemoryContentDirectory {
    async fn article_exists(&self, article_id: ArticleId) -> Result<bool, ContentError> {
        let mut dir = self.lock()?;
        if dir.accept_any {
            dir.articles.entry(article_id).or_insert(None);
        }
        Ok(dir.articles.contains_key(&article_id))
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, ContentError> {
        let mut dir = self.lock()?;
        if dir.accept_any {
            dir.users.insert(user_id);
        }
        Ok(dir.users.contains(&user_id))
    }

    async fn set_article_status(
        &self,
        article_id: ArticleId,
        status: ArticleStatus,
    ) -> Result<(), ContentError> {
        match self.lock()?.articles.get_mut(&article_id) {
            Some(slot) => {
                *slot = Some(status);
                Ok(())
            }
            None => Err(ContentError::ArticleNotFound(article_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_ids_are_rejected_by_default() {
        let dir = InMemoryContentDirectory::new();
        let article = ArticleId::new();

        assert!(!dir.article_exists(article).await.unwrap());
        assert!(!dir.user_exists(UserId::new()).await.unwrap());
        assert!(matches!(
            dir.set_article_status(article, ArticleStatus::Processing).await,
            Err(ContentError::ArticleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn accepting_any_registers_ids_on_first_sight() {
        let dir = InMemoryContentDirectory::accepting_any();
        let article = ArticleId::new();

        assert!(dir.article_exists(article).await.unwrap());
        assert!(dir.user_exists(UserId::new()).await.unwrap());
        dir.set_article_status(article, ArticleStatus::Summarized)
            .await
            .unwrap();
        assert_eq!(
            dir.article_status(article).unwrap(),
            Some(ArticleStatus::Summarized)
        );
    }
}
