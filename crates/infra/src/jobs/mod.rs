//! Summary job lifecycle.
//!
//! ## Design
//!
//! - Submission checks the target, persists a QUEUED job and dispatches it in the background
//! - Worker callbacks and operator actions go through the pure functions in [`transitions`],
//!   applied inside a locked store update
//! - Failures are retried up to `max_attempts`; the stale-job reaper feeds timeouts through
//!   the same failure path
//! - Sweeps (stale-job reaper, retention) run on their own timers
//!
//! ## Components
//!
//! - `JobService`: submit, claim, callbacks, retry, cancel, regenerate, queries
//! - `StaleJobReaper` / `RetentionSweeper`: periodic maintenance
//! - `spawn_sweep`: timer-driven runner with graceful shutdown

mod callbacks;
mod error;
mod queries;
mod regenerate;
mod runner;
mod service;
mod submit;
mod sweeps;
pub mod transitions;

#[cfg(test)]
mod testing;

pub use callbacks::GeneratedSummary;
pub use error::JobError;
pub use queries::MAX_PAGE_SIZE;
pub use runner::{SweepHandle, SweepSchedule, spawn_sweep};
pub use service::{JobService, JobSettings};
pub use sweeps::{
    ReapReport, RetentionSweeper, STALE_JOB_ERROR, StaleJobReaper, Sweep, UNDISPATCHED_JOB_ERROR,
};
