//! Summary generation jobs.
//!
//! A job is plain data. Every status change is made by the transition
//! functions of the job lifecycle service; nothing here mutates a job.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{ArticleId, JobId, UserId};
use crate::summary::{SummaryKind, SummaryLength};

/// Priority of jobs requested on behalf of a specific reader.
pub const USER_PRIORITY: i32 = 7;

/// Priority of default (shared) summary jobs.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Attempts allowed before a job fails permanently.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Job lifecycle status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting for the worker to accept it
    Queued,
    /// Accepted by the worker, result pending
    Processing,
    /// Summary persisted
    Completed,
    /// Failed; retryable by an operator while attempts remain
    Failed,
    /// Manually stopped
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Active jobs count against the one-active-job-per-target rule.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job status: {s}")))
    }
}

/// What a job generates a summary for: an article, either for one reader or
/// for everyone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryTarget {
    pub article_id: ArticleId,
    /// `None` means the default summary shared by all readers.
    pub user_id: Option<UserId>,
}

impl SummaryTarget {
    pub fn new(article_id: ArticleId, user_id: Option<UserId>) -> Self {
        Self { article_id, user_id }
    }

    pub fn shared(article_id: ArticleId) -> Self {
        Self::new(article_id, None)
    }

    pub fn for_user(article_id: ArticleId, user_id: UserId) -> Self {
        Self::new(article_id, Some(user_id))
    }

    pub fn is_default(&self) -> bool {
        self.user_id.is_none()
    }

    /// Reader-specific requests outrank shared ones.
    pub fn priority(&self) -> i32 {
        if self.is_default() {
            DEFAULT_PRIORITY
        } else {
            USER_PRIORITY
        }
    }
}

impl core::fmt::Display for SummaryTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.user_id {
            Some(user) => write!(f, "article {} for user {}", self.article_id, user),
            None => write!(f, "article {} (default)", self.article_id),
        }
    }
}

/// A tracked request to generate one summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub article_id: ArticleId,
    pub user_id: Option<UserId>,
    pub kind: SummaryKind,
    pub length: SummaryLength,
    pub status: JobStatus,
    /// Higher runs first.
    pub priority: i32,
    /// Failure callbacks received so far, synthesized timeouts included.
    pub attempts: u32,
    pub max_attempts: u32,
    pub error_message: Option<String>,
    /// Correlation id handed out by the worker when it accepted the job.
    pub worker_external_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly submitted job.
    pub fn queued(
        target: SummaryTarget,
        kind: SummaryKind,
        length: SummaryLength,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            article_id: target.article_id,
            user_id: target.user_id,
            kind,
            length,
            status: JobStatus::Queued,
            priority: target.priority(),
            attempts: 0,
            max_attempts,
            error_message: None,
            worker_external_id: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn target(&self) -> SummaryTarget {
        SummaryTarget::new(self.article_id, self.user_id)
    }

    pub fn is_default(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}
