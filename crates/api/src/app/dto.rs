use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use synopsi_core::{
    ArticleId, Job, JobId, JobStats, JobStatus, Summary, SummaryId, SummaryKind, SummaryLength,
    SummaryStatus, UserId,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub article_id: String,
    pub user_id: Option<String>,
    pub summary_type: Option<String>,
    pub summary_length: Option<String>,
}

/// Query string for summary lookups by article.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryLookupQuery {
    pub user_id: Option<String>,
    pub summary_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub article_id: String,
    pub user_id: Option<String>,
    pub summary_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    20
}

/// Identifies the job a worker callback refers to: our id or the worker's own.
#[derive(Debug, Deserialize)]
pub struct CallbackJobRef {
    pub job_id: Option<String>,
    pub worker_job_id: Option<String>,
}

/// A pull-based worker takes a queued job.
#[derive(Debug, Deserialize)]
pub struct StartCallback {
    pub job_id: String,
    pub worker_job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteCallback {
    #[serde(flatten)]
    pub job: CallbackJobRef,
    pub summary_text: String,
    pub model_version: String,
    pub token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct FailureCallback {
    #[serde(flatten)]
    pub job: CallbackJobRef,
    pub error_message: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub article_id: ArticleId,
    pub user_id: Option<UserId>,
    pub summary_type: SummaryKind,
    pub summary_length: SummaryLength,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub error_message: Option<String>,
    pub worker_job_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            article_id: job.article_id,
            user_id: job.user_id,
            summary_type: job.kind,
            summary_length: job.length,
            status: job.status,
            priority: job.priority,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            error_message: job.error_message,
            worker_job_id: job.worker_external_id,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub id: SummaryId,
    pub article_id: ArticleId,
    pub user_id: Option<UserId>,
    pub summary_text: String,
    pub summary_type: SummaryKind,
    pub summary_length: SummaryLength,
    pub model_version: String,
    pub token_count: Option<i32>,
    pub generated_at: DateTime<Utc>,
    pub status: SummaryStatus,
    pub regeneration_count: u32,
}

impl From<Summary> for SummaryResponse {
    fn from(summary: Summary) -> Self {
        Self {
            id: summary.id,
            article_id: summary.article_id,
            user_id: summary.user_id,
            summary_text: summary.text,
            summary_type: summary.kind,
            summary_length: summary.length,
            model_version: summary.model_version,
            token_count: summary.token_count,
            generated_at: summary.generated_at,
            status: summary.status,
            regeneration_count: summary.regeneration_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobStatsResponse {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total: u64,
}

impl From<JobStats> for JobStatsResponse {
    fn from(stats: JobStats) -> Self {
        Self {
            queued: stats.queued,
            processing: stats.processing,
            completed: stats.completed,
            failed: stats.failed,
            cancelled: stats.cancelled,
            total: stats.queued + stats.processing + stats.completed + stats.failed + stats.cancelled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
}

pub fn summaries_to_json(summaries: Vec<Summary>) -> Vec<SummaryResponse> {
    summaries.into_iter().map(SummaryResponse::from).collect()
}
