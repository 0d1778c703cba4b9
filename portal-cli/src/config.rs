//! Ingest configuration.
//!
//! Priority: env vars > config file > defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use portal_fetch::{FetchOptions, RetryPolicy};
use portal_import::IngestOptions;

use crate::error::CliError;

pub const DEFAULT_API_BASE: &str = "https://rickandmortyapi.com/api";

/// Settings for one run of the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub api_base: String,
    pub database_path: PathBuf,
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub batch_size: usize,
    /// Rebuild link tables from stored lists instead of fetching.
    pub relink_only: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            database_path: default_database_path(),
            max_concurrent_requests: portal_fetch::DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: portal_fetch::DEFAULT_REQUEST_TIMEOUT,
            max_attempts: RetryPolicy::default().max_attempts,
            backoff_factor: RetryPolicy::default().backoff_factor,
            batch_size: portal_db::DEFAULT_BATCH_SIZE,
            relink_only: false,
        }
    }
}

/// TOML config file format.
#[derive(Debug, Default, serde::Deserialize)]
struct ConfigFile {
    ingest: Option<IngestSection>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct IngestSection {
    api_base: Option<String>,
    database_path: Option<PathBuf>,
    max_concurrent_requests: Option<usize>,
    request_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    backoff_factor: Option<f64>,
    batch_size: Option<usize>,
    relink_only: Option<bool>,
}

/// Return the path to the config file.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("portal-ingest").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("portal-ingest"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portal.db")
}

fn env_value<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, CliError> {
    match env(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CliError::config(format!("{var}: cannot parse '{raw}'"))),
    }
}

impl IngestConfig {
    /// Load from the process environment and the user's config file.
    pub fn load() -> Result<Self, CliError> {
        let text = match config_path() {
            Some(path) if path.exists() => {
                log::debug!("Reading config from {}", path.display());
                Some(std::fs::read_to_string(&path)?)
            }
            _ => None,
        };
        Self::from_sources(text.as_deref(), |var| std::env::var(var).ok())
    }

    /// Merge a config file body and an environment lookup over the defaults.
    pub fn from_sources(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let section = match file {
            Some(text) => toml::from_str::<ConfigFile>(text)
                .map_err(|e| CliError::config(format!("invalid config file: {e}")))?
                .ingest
                .unwrap_or_default(),
            None => IngestSection::default(),
        };
        let defaults = Self::default();

        let timeout_secs = env_value::<u64>(&env, "PORTAL_REQUEST_TIMEOUT")?
            .or(section.request_timeout_secs);

        let config = Self {
            api_base: env("PORTAL_API_BASE")
                .or(section.api_base)
                .unwrap_or(defaults.api_base),
            database_path: env("PORTAL_DB_PATH")
                .map(PathBuf::from)
                .or(section.database_path)
                .unwrap_or(defaults.database_path),
            max_concurrent_requests: env_value(&env, "PORTAL_MAX_CONCURRENCY")?
                .or(section.max_concurrent_requests)
                .unwrap_or(defaults.max_concurrent_requests),
            request_timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_attempts: env_value(&env, "PORTAL_MAX_ATTEMPTS")?
                .or(section.max_attempts)
                .unwrap_or(defaults.max_attempts),
            backoff_factor: env_value(&env, "PORTAL_BACKOFF_FACTOR")?
                .or(section.backoff_factor)
                .unwrap_or(defaults.backoff_factor),
            batch_size: env_value(&env, "PORTAL_BATCH_SIZE")?
                .or(section.batch_size)
                .unwrap_or(defaults.batch_size),
            relink_only: env_value(&env, "PORTAL_RELINK_ONLY")?
                .or(section.relink_only)
                .unwrap_or(defaults.relink_only),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CliError> {
        if self.max_concurrent_requests == 0 {
            return Err(CliError::config("max_concurrent_requests must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(CliError::config("max_attempts must be at least 1"));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(CliError::config("backoff_factor must be a finite number >= 1"));
        }
        if self.batch_size == 0 {
            return Err(CliError::config("batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_concurrent_requests: self.max_concurrent_requests,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                backoff_factor: self.backoff_factor,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            batch_size: self.batch_size,
        }
    }
}
