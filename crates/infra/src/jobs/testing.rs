//! Shared fixtures for job lifecycle tests.

use std::sync::Arc;

use synopsi_core::{ArticleId, UserId};

use crate::content::{ArticleStatus, InMemoryContentDirectory};
use crate::store::InMemoryJobStore;
use crate::worker::RecordingWorkerGateway;

use super::service::{JobService, JobSettings};

pub(crate) struct Harness {
    pub store: Arc<InMemoryJobStore>,
    pub content: Arc<InMemoryContentDirectory>,
    pub gateway: Arc<RecordingWorkerGateway>,
    pub service: Arc<JobService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(RecordingWorkerGateway::new())
    }

    pub fn with_gateway(gateway: RecordingWorkerGateway) -> Self {
        Self::build(gateway, JobSettings::default())
    }

    pub fn with_settings(settings: JobSettings) -> Self {
        Self::build(RecordingWorkerGateway::new(), settings)
    }

    fn build(gateway: RecordingWorkerGateway, settings: JobSettings) -> Self {
        let store = InMemoryJobStore::arc();
        let content = InMemoryContentDirectory::arc();
        let gateway = Arc::new(gateway);
        let service = Arc::new(JobService::new(
            store.clone(),
            content.clone(),
            gateway.clone(),
            settings,
        ));
        Self {
            store,
            content,
            gateway,
            service,
        }
    }

    pub fn article(&self) -> ArticleId {
        let id = ArticleId::new();
        self.content.add_article(id).unwrap();
        id
    }

    pub fn user(&self) -> UserId {
        let id = UserId::new();
        self.content.add_user(id).unwrap();
        id
    }

    pub fn article_status(&self, id: ArticleId) -> Option<ArticleStatus> {
        self.content.article_status(id).unwrap()
    }
}
