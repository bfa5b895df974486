//! In-memory job store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use synopsi_core::{
    ArticleId, Job, JobId, JobStats, JobStatus, Summary, SummaryId, SummaryKind, SummaryStatus,
    SummaryTarget, UserId,
};

use super::{CompletionMutation, JobMutation, JobStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<JobId, Job>,
    summaries: HashMap<SummaryId, Summary>,
}

impl Tables {
    fn active_for(&self, target: SummaryTarget, except: Option<JobId>) -> Option<&Job> {
        self.jobs.values().find(|j| {
            j.status.is_active() && j.target() == target && Some(j.id) != except
        })
    }

    fn latest_summary(&self, target: SummaryTarget, kind: SummaryKind) -> Option<&Summary> {
        self.summaries
            .values()
            .filter(|s| {
                s.article_id == target.article_id
                    && s.user_id == target.user_id
                    && s.kind == kind
                    && s.status == SummaryStatus::Completed
            })
            .max_by_key(|s| (s.generated_at, s.id))
    }
}

/// Single-lock store: every operation is one critical section, which gives the same
/// atomicity as a row lock plus transaction.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    tables: Mutex<Tables>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed a summary directly (tests/dev).
    pub fn put_summary(&self, summary: Summary) -> Result<(), StoreError> {
        self.lock()?.summaries.insert(summary.id, summary);
        Ok(())
    }

    /// Overwrite a job as-is, bypassing transition checks (tests/dev).
    pub fn put_job(&self, job: Job) -> Result<(), StoreError> {
        self.lock()?.jobs.insert(job.id, job);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Storage("job store lock poisoned".to_string()))
    }
}

fn dispatch_order(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.submitted_at.cmp(&b.submitted_at))
    });
}

fn newest_first(summaries: &mut [Summary]) {
    summaries.sort_by(|a, b| (b.generated_at, b.id).cmp(&(a.generated_at, a.id)));
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, job: Job) -> Result<Job, StoreError> {
        let mut tables = self.lock()?;
        if tables.jobs.contains_key(&job.id) {
            return Err(StoreError::conflict(format!("job {} already exists", job.id)));
        }
        if job.status.is_active() {
            if let Some(existing) = tables.active_for(job.target(), None) {
                return Err(StoreError::conflict(format!(
                    "job {} is already {} for {}",
                    existing.id,
                    existing.status,
                    job.target()
                )));
            }
        }
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn find_active_job(&self, target: SummaryTarget) -> Result<Option<Job>, StoreError> {
        Ok(self.lock()?.active_for(target, None).cloned())
    }

    async fn find_by_worker_external_id(
        &self,
        worker_external_id: &str,
    ) -> Result<Option<Job>, StoreError> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .find(|j| j.worker_external_id.as_deref() == Some(worker_external_id))
            .cloned())
    }

    async fn update_job(&self, id: JobId, mutation: JobMutation) -> Result<Job, StoreError> {
        let mut tables = self.lock()?;
        let mut job = tables
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;
        let was_active = job.status.is_active();

        mutation(&mut job)?;

        if job.status.is_active() && !was_active {
            if let Some(existing) = tables.active_for(job.target(), Some(id)) {
                return Err(StoreError::conflict(format!(
                    "job {} is already {} for {}",
                    existing.id,
                    existing.status,
                    job.target()
                )));
            }
        }
        tables.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn complete_job(
        &self,
        id: JobId,
        mutation: CompletionMutation,
    ) -> Result<(Job, Summary), StoreError> {
        let mut tables = self.lock()?;
        let mut job = tables
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;

        let summary = mutation(&mut job)?;

        tables.summaries.insert(summary.id, summary.clone());
        tables.jobs.insert(id, job.clone());
        Ok((job, summary))
    }

    async fn list_queued(&self) -> Result<Vec<Job>, StoreError> {
        let mut queued: Vec<Job> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .cloned()
            .collect();
        dispatch_order(&mut queued);
        Ok(queued)
    }

    async fn list_stale_processing(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        let mut stale: Vec<Job> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Processing
                    && j.started_at.is_some_and(|started| started < started_before)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|j| j.started_at);
        Ok(stale)
    }

    async fn list_stranded_queued(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        let mut stranded: Vec<Job> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued && j.updated_at < updated_before)
            .cloned()
            .collect();
        dispatch_order(&mut stranded);
        Ok(stranded)
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let before = tables.jobs.len();
        tables.jobs.retain(|_, j| {
            !(j.status == JobStatus::Completed && j.completed_at.is_some_and(|at| at < cutoff))
        });
        Ok((before - tables.jobs.len()) as u64)
    }

    async fn job_stats(&self) -> Result<JobStats, StoreError> {
        let mut stats = JobStats::default();
        for job in self.lock()?.jobs.values() {
            stats.record(job.status);
        }
        Ok(stats)
    }

    async fn get_summary(&self, id: SummaryId) -> Result<Option<Summary>, StoreError> {
        Ok(self.lock()?.summaries.get(&id).cloned())
    }

    async fn find_summary(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<Option<Summary>, StoreError> {
        Ok(self.lock()?.latest_summary(target, kind).cloned())
    }

    async fn list_article_summaries(
        &self,
        article_id: ArticleId,
    ) -> Result<Vec<Summary>, StoreError> {
        let mut summaries: Vec<Summary> = self
            .lock()?
            .summaries
            .values()
            .filter(|s| s.article_id == article_id)
            .cloned()
            .collect();
        newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn list_user_summaries(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Vec<Summary>, StoreError> {
        let mut summaries: Vec<Summary> = self
            .lock()?
            .summaries
            .values()
            .filter(|s| s.user_id == Some(user_id))
            .cloned()
            .collect();
        newest_first(&mut summaries);
        Ok(summaries
            .into_iter()
            .skip(page as usize * size as usize)
            .take(size as usize)
            .collect())
    }

    async fn summary_exists(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<bool, StoreError> {
        Ok(self.lock()?.latest_summary(target, kind).is_some())
    }

    async fn increment_regeneration_count(&self, id: SummaryId) -> Result<Summary, StoreError> {
        let mut tables = self.lock()?;
        let summary = tables
            .summaries
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("summary {id}")))?;
        summary.regeneration_count += 1;
        Ok(summary.clone())
    }
}
