//! Configuration loading and representation.
//!
//! Everything comes from environment variables; a `.env` file is honoured in
//! development.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use synopsi_core::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which worker the service hands jobs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Base URL of the worker service; `None` leaves jobs queued for a pull-based worker.
    pub url: Option<String>,
    pub timeout: Duration,
    /// Shared token the worker must present on callbacks; `None` disables the check.
    pub callback_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres-backed stores when true, in-memory otherwise.
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// In-memory mode only: treat every article and reader id as known.
    pub content_accept_any: bool,
    pub worker: WorkerConfig,
    pub max_attempts: u32,
    /// PROCESSING jobs older than this are timed out.
    pub stale_job_timeout: Duration,
    pub reaper_interval: Duration,
    /// COMPLETED jobs older than this are deleted.
    pub job_retention: Duration,
    pub retention_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            content_accept_any: true,
            worker: WorkerConfig {
                url: None,
                timeout: Duration::from_secs(10),
                callback_token: None,
            },
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            stale_job_timeout: Duration::from_secs(2 * 60 * 60),
            reaper_interval: Duration::from_secs(60 * 60),
            job_retention: Duration::from_secs(7 * 24 * 60 * 60),
            retention_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl AppConfig {
    /// Load from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let use_persistent_stores = match var("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
            None => defaults.use_persistent_stores,
        };
        let database_url = var("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing {
                name: "DATABASE_URL",
            });
        }

        let max_attempts = parse_or("JOB_MAX_ATTEMPTS", var("JOB_MAX_ATTEMPTS"), defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "JOB_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let content_accept_any = match var("CONTENT_ACCEPT_ANY") {
            Some(v) => parse_bool("CONTENT_ACCEPT_ANY", &v)?,
            None => defaults.content_accept_any,
        };

        Ok(Self {
            bind_addr: parse_or("BIND_ADDR", var("BIND_ADDR"), defaults.bind_addr)?,
            use_persistent_stores,
            database_url,
            content_accept_any,
            worker: WorkerConfig {
                url: var("WORKER_URL"),
                timeout: secs_or("WORKER_TIMEOUT_SECS", var("WORKER_TIMEOUT_SECS"), defaults.worker.timeout)?,
                callback_token: var("WORKER_CALLBACK_TOKEN"),
            },
            max_attempts,
            stale_job_timeout: secs_or(
                "STALE_JOB_TIMEOUT_SECS",
                var("STALE_JOB_TIMEOUT_SECS"),
                defaults.stale_job_timeout,
            )?,
            reaper_interval: secs_or(
                "REAPER_INTERVAL_SECS",
                var("REAPER_INTERVAL_SECS"),
                defaults.reaper_interval,
            )?,
            job_retention: match var("JOB_RETENTION_DAYS") {
                Some(v) => Duration::from_secs(parse::<u64>("JOB_RETENTION_DAYS", &v)? * 24 * 60 * 60),
                None => defaults.job_retention,
            },
            retention_interval: secs_or(
                "RETENTION_INTERVAL_SECS",
                var("RETENTION_INTERVAL_SECS"),
                defaults.retention_interval,
            )?,
        })
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse(name, &v),
        None => Ok(default),
    }
}

fn secs_or(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(v) => {
            let secs: u64 = parse(name, &v)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: v,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
