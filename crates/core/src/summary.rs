//! Summaries and the parameters a summary is generated with.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{ArticleId, SummaryId, UserId};
use crate::job::Job;

/// Style of summary the worker is asked to produce.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryKind {
    /// Short overview
    Brief,
    /// Comprehensive summary
    Detailed,
    /// Explain like I'm five
    Eli5,
    /// One bullet per paragraph
    List,
    /// Reader-defined parameters
    Custom,
}

/// Target length of the generated text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryLength {
    /// ~50-100 words
    Short,
    /// ~100-200 words
    Medium,
    /// ~200-400 words
    Long,
}

impl Default for SummaryKind {
    fn default() -> Self {
        Self::Brief
    }
}

impl Default for SummaryLength {
    fn default() -> Self {
        Self::Medium
    }
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Brief => "BRIEF",
            SummaryKind::Detailed => "DETAILED",
            SummaryKind::Eli5 => "ELI5",
            SummaryKind::List => "LIST",
            SummaryKind::Custom => "CUSTOM",
        }
    }
}

impl FromStr for SummaryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BRIEF" => Ok(Self::Brief),
            "DETAILED" => Ok(Self::Detailed),
            "ELI5" => Ok(Self::Eli5),
            "LIST" => Ok(Self::List),
            "CUSTOM" => Ok(Self::Custom),
            other => Err(DomainError::validation(format!(
                "summary type must be one of BRIEF, DETAILED, ELI5, LIST, CUSTOM (got {other})"
            ))),
        }
    }
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "SHORT",
            SummaryLength::Medium => "MEDIUM",
            SummaryLength::Long => "LONG",
        }
    }
}

impl FromStr for SummaryLength {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHORT" => Ok(Self::Short),
            "MEDIUM" => Ok(Self::Medium),
            "LONG" => Ok(Self::Long),
            other => Err(DomainError::validation(format!(
                "summary length must be one of SHORT, MEDIUM, LONG (got {other})"
            ))),
        }
    }
}

/// Outcome recorded on a summary row.
///
/// Rows are only written for successful generations; failures live on the job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryStatus {
    Completed,
    Failed,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Completed => "COMPLETED",
            SummaryStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for SummaryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(DomainError::validation(format!("unknown summary status: {other}"))),
        }
    }
}

/// A generated summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub article_id: ArticleId,
    /// `None` for the default summary shown to every reader.
    pub user_id: Option<UserId>,
    pub text: String,
    pub kind: SummaryKind,
    pub length: SummaryLength,
    pub model_version: String,
    pub token_count: Option<i32>,
    pub generated_at: DateTime<Utc>,
    pub status: SummaryStatus,
    pub regeneration_count: u32,
}

impl Summary {
    /// Build the summary produced by a finished job.
    pub fn for_job(
        job: &Job,
        text: impl Into<String>,
        model_version: impl Into<String>,
        token_count: Option<i32>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SummaryId::new(),
            article_id: job.article_id,
            user_id: job.user_id,
            text: text.into(),
            kind: job.kind,
            length: job.length,
            model_version: model_version.into(),
            token_count,
            generated_at,
            status: SummaryStatus::Completed,
            regeneration_count: 0,
        }
    }

    pub fn is_default(&self) -> bool {
        self.user_id.is_none()
    }
}
