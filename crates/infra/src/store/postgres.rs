//! Postgres-backed job store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Domain(Conflict)` | A second active job for the same target |
//! | Database (other) | Any other | `Storage` | Constraint or server failures |
//! | PoolClosed / Other | N/A | `Storage` | Connection or network failures |
//!
//! ## Concurrency
//!
//! Mutations run in a transaction that first takes `SELECT ... FOR UPDATE` on the job
//! row. The partial unique index `summary_jobs_one_active_per_target` backs the
//! one-active-job rule even when two submissions race.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use synopsi_core::{
    ArticleId, Job, JobId, JobStats, JobStatus, Summary, SummaryId, SummaryKind, SummaryTarget,
    UserId,
};

use super::{CompletionMutation, JobMutation, JobStore, StoreError};

const JOB_COLUMNS: &str = r#"
    id,
    article_id,
    user_id,
    summary_type,
    summary_length,
    status,
    priority,
    attempts,
    max_attempts,
    error_message,
    worker_external_id,
    submitted_at,
    started_at,
    completed_at,
    updated_at
"#;

const SUMMARY_COLUMNS: &str = r#"
    id,
    article_id,
    user_id,
    summary_text,
    summary_type,
    summary_length,
    model_version,
    token_count,
    generated_at,
    status,
    regeneration_count
"#;

/// Postgres-backed job and summary store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("migration failed: {e}")))
    }

    async fn fetch_jobs(&self, sql: &str, at: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(sql)
            .bind(at)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_jobs", e))?;
        rows.iter().map(job_from_row).collect()
    }
}

async fn lock_job(
    tx: &mut Transaction<'_, Postgres>,
    id: JobId,
) -> Result<Job, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM summary_jobs WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_job", e))?;

    match row {
        Some(row) => job_from_row(&row),
        None => Err(StoreError::not_found(format!("job {id}"))),
    }
}

async fn write_job(tx: &mut Transaction<'_, Postgres>, job: &Job) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE summary_jobs SET
            status = $2,
            priority = $3,
            attempts = $4,
            max_attempts = $5,
            error_message = $6,
            worker_external_id = $7,
            started_at = $8,
            completed_at = $9,
            updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(job.id.as_uuid())
    .bind(job.status.as_str())
    .bind(job.priority)
    .bind(job.attempts as i32)
    .bind(job.max_attempts as i32)
    .bind(&job.error_message)
    .bind(&job.worker_external_id)
    .bind(job.started_at)
    .bind(job.completed_at)
    .bind(job.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_job", e))?;
    Ok(())
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, article_id = %job.article_id), err)]
    async fn insert_job(&self, job: Job) -> Result<Job, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO summary_jobs (
                id,
                article_id,
                user_id,
                summary_type,
                summary_length,
                status,
                priority,
                attempts,
                max_attempts,
                error_message,
                worker_external_id,
                submitted_at,
                started_at,
                completed_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.article_id.as_uuid())
        .bind(job.user_id.map(uuid::Uuid::from))
        .bind(job.kind.as_str())
        .bind(job.length.as_str())
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(&job.error_message)
        .bind(&job.worker_external_id)
        .bind(job.submitted_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict(format!("an active job already exists for {}", job.target()))
            } else {
                map_sqlx_error("insert_job", e)
            }
        })?;
        Ok(job)
    }

    #[instrument(skip(self), err)]
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM summary_jobs WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;
        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_active_job(&self, target: SummaryTarget) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM summary_jobs
            WHERE article_id = $1
              AND user_id IS NOT DISTINCT FROM $2
              AND status IN ('QUEUED', 'PROCESSING')
            LIMIT 1
            "#
        ))
        .bind(target.article_id.as_uuid())
        .bind(target.user_id.map(uuid::Uuid::from))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_active_job", e))?;
        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_worker_external_id(
        &self,
        worker_external_id: &str,
    ) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM summary_jobs WHERE worker_external_id = $1 LIMIT 1"
        ))
        .bind(worker_external_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_worker_external_id", e))?;
        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(
        skip(self, mutation),
        fields(job_id = %id, transition = tracing::field::Empty),
        err
    )]
    async fn update_job(&self, id: JobId, mutation: JobMutation) -> Result<Job, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut job = lock_job(&mut tx, id).await?;
        let from = job.status;
        if let Err(e) = mutation(&mut job) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(e.into());
        }

        write_job(&mut tx, &job).await.map_err(|e| match e {
            StoreError::Domain(synopsi_core::DomainError::Conflict(_)) => StoreError::conflict(
                format!("an active job already exists for {}", job.target()),
            ),
            other => other,
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record(
            "transition",
            tracing::field::display(format_args!("{from} -> {}", job.status)),
        );
        Ok(job)
    }

    #[instrument(skip(self, mutation), fields(job_id = %id), err)]
    async fn complete_job(
        &self,
        id: JobId,
        mutation: CompletionMutation,
    ) -> Result<(Job, Summary), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut job = lock_job(&mut tx, id).await?;
        let summary = match mutation(&mut job) {
            Ok(summary) => summary,
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }
        };

        sqlx::query(&format!(
            r#"
            INSERT INTO summaries ({SUMMARY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#
        ))
        .bind(summary.id.as_uuid())
        .bind(summary.article_id.as_uuid())
        .bind(summary.user_id.map(uuid::Uuid::from))
        .bind(&summary.text)
        .bind(summary.kind.as_str())
        .bind(summary.length.as_str())
        .bind(&summary.model_version)
        .bind(summary.token_count)
        .bind(summary.generated_at)
        .bind(summary.status.as_str())
        .bind(summary.regeneration_count as i32)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_summary", e))?;

        write_job(&mut tx, &job).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((job, summary))
    }

    #[instrument(skip(self), err)]
    async fn list_queued(&self) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM summary_jobs
            WHERE status = 'QUEUED'
            ORDER BY priority DESC, submitted_at ASC
            "#
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_queued", e))?;
        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_stale_processing(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        self.fetch_jobs(
            &format!(
                r#"
                SELECT {JOB_COLUMNS} FROM summary_jobs
                WHERE status = 'PROCESSING' AND started_at < $1
                ORDER BY started_at ASC
                "#
            ),
            started_before,
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn list_stranded_queued(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        self.fetch_jobs(
            &format!(
                r#"
                SELECT {JOB_COLUMNS} FROM summary_jobs
                WHERE status = 'QUEUED' AND updated_at < $1
                ORDER BY priority DESC, submitted_at ASC
                "#
            ),
            updated_before,
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM summary_jobs
            WHERE status = 'COMPLETED' AND completed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_completed_before", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn job_stats(&self) -> Result<JobStats, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM summary_jobs GROUP BY status")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("job_stats", e))?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(decode_error)?;
            let count: i64 = row.try_get("count").map_err(decode_error)?;
            let count = count as u64;
            match status.parse::<JobStatus>()? {
                JobStatus::Queued => stats.queued = count,
                JobStatus::Processing => stats.processing = count,
                JobStatus::Completed => stats.completed = count,
                JobStatus::Failed => stats.failed = count,
                JobStatus::Cancelled => stats.cancelled = count,
            }
        }
        Ok(stats)
    }

    #[instrument(skip(self), err)]
    async fn get_summary(&self, id: SummaryId) -> Result<Option<Summary>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SUMMARY_COLUMNS} FROM summaries WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_summary", e))?;
        row.as_ref().map(summary_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_summary(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<Option<Summary>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SUMMARY_COLUMNS} FROM summaries
            WHERE article_id = $1
              AND user_id IS NOT DISTINCT FROM $2
              AND summary_type = $3
              AND status = 'COMPLETED'
            ORDER BY generated_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(target.article_id.as_uuid())
        .bind(target.user_id.map(uuid::Uuid::from))
        .bind(kind.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_summary", e))?;
        row.as_ref().map(summary_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_article_summaries(
        &self,
        article_id: ArticleId,
    ) -> Result<Vec<Summary>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SUMMARY_COLUMNS} FROM summaries
            WHERE article_id = $1
            ORDER BY generated_at DESC, id DESC
            "#
        ))
        .bind(article_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_article_summaries", e))?;
        rows.iter().map(summary_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_user_summaries(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Vec<Summary>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SUMMARY_COLUMNS} FROM summaries
            WHERE user_id = $1
            ORDER BY generated_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(i64::from(size))
        .bind(i64::from(page) * i64::from(size))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_user_summaries", e))?;
        rows.iter().map(summary_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn summary_exists(
        &self,
        target: SummaryTarget,
        kind: SummaryKind,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM summaries
                WHERE article_id = $1
                  AND user_id IS NOT DISTINCT FROM $2
                  AND summary_type = $3
                  AND status = 'COMPLETED'
            ) AS present
            "#,
        )
        .bind(target.article_id.as_uuid())
        .bind(target.user_id.map(uuid::Uuid::from))
        .bind(kind.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("summary_exists", e))?;
        row.try_get("present").map_err(decode_error)
    }

    #[instrument(skip(self), err)]
    async fn increment_regeneration_count(&self, id: SummaryId) -> Result<Summary, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE summaries
            SET regeneration_count = regeneration_count + 1
            WHERE id = $1
            RETURNING {SUMMARY_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("increment_regeneration_count", e))?;
        match row {
            Some(row) => summary_from_row(&row),
            None => Err(StoreError::not_found(format!("summary {id}"))),
        }
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("failed to decode row: {err}"))
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> Result<Job, StoreError> {
    let user_id: Option<uuid::Uuid> = row.try_get("user_id").map_err(decode_error)?;
    let kind: String = row.try_get("summary_type").map_err(decode_error)?;
    let length: String = row.try_get("summary_length").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let attempts: i32 = row.try_get("attempts").map_err(decode_error)?;
    let max_attempts: i32 = row.try_get("max_attempts").map_err(decode_error)?;

    Ok(Job {
        id: JobId::from_uuid(row.try_get("id").map_err(decode_error)?),
        article_id: ArticleId::from_uuid(row.try_get("article_id").map_err(decode_error)?),
        user_id: user_id.map(UserId::from_uuid),
        kind: kind.parse()?,
        length: length.parse()?,
        status: status.parse()?,
        priority: row.try_get("priority").map_err(decode_error)?,
        attempts: attempts.max(0) as u32,
        max_attempts: max_attempts.max(0) as u32,
        error_message: row.try_get("error_message").map_err(decode_error)?,
        worker_external_id: row.try_get("worker_external_id").map_err(decode_error)?,
        submitted_at: row.try_get("submitted_at").map_err(decode_error)?,
        started_at: row.try_get("started_at").map_err(decode_error)?,
        completed_at: row.try_get("completed_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}

fn summary_from_row(row: &sqlx::postgres::PgRow) -> Result<Summary, StoreError> {
    let user_id: Option<uuid::Uuid> = row.try_get("user_id").map_err(decode_error)?;
    let kind: String = row.try_get("summary_type").map_err(decode_error)?;
    let length: String = row.try_get("summary_length").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let regeneration_count: i32 = row.try_get("regeneration_count").map_err(decode_error)?;

    Ok(Summary {
        id: SummaryId::from_uuid(row.try_get("id").map_err(decode_error)?),
        article_id: ArticleId::from_uuid(row.try_get("article_id").map_err(decode_error)?),
        user_id: user_id.map(UserId::from_uuid),
        text: row.try_get("summary_text").map_err(decode_error)?,
        kind: kind.parse()?,
        length: length.parse()?,
        model_version: row.try_get("model_version").map_err(decode_error)?,
        token_count: row.try_get("token_count").map_err(decode_error)?,
        generated_at: row.try_get("generated_at").map_err(decode_error)?,
        status: status.parse()?,
        regeneration_count: regeneration_count.max(0) as u32,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
