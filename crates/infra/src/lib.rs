//! Infrastructure layer: persistence, the worker gateway, config and the job lifecycle.

pub mod config;
pub mod content;
pub mod jobs;
pub mod store;
pub mod worker;
