//! `synopsi-core`: domain building blocks for summary generation.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, jobs, summaries and the domain error model.

pub mod error;
pub mod id;
pub mod job;
pub mod summary;

pub use error::{DomainError, DomainResult};
pub use id::{ArticleId, JobId, SummaryId, UserId};
pub use job::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PRIORITY, Job, JobStats, JobStatus, SummaryTarget,
    USER_PRIORITY,
};
pub use summary::{Summary, SummaryKind, SummaryLength, SummaryStatus};
