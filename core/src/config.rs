//! Batch configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::backoff::Backoff;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Largest page the permissions listing accepts.
const MAX_PAGE_SIZE: u32 = 100;

pub const MAX_CONCURRENCY: usize = 1_000;

/// One day.
pub const MAX_TASK_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Base URL of the collection API.
    pub api_base: String,

    /// Maximum number of documents processed at once.
    pub concurrency: usize,

    /// Deadline for one document's work, measured from when it starts.
    pub task_timeout_secs: u64,

    /// Permissions requested per listing page.
    pub page_size: u32,

    /// Send notification email to grantees.
    pub notify: bool,

    pub supports_team_drives: bool,

    pub backoff: BackoffConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            concurrency: 10,
            task_timeout_secs: 60,
            page_size: 10,
            notify: false,
            supports_team_drives: true,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 10_000,
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_ms),
            Duration::from_millis(self.max_ms),
        )
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::Invalid(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if !(1..=MAX_TASK_TIMEOUT_SECS).contains(&self.task_timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "task_timeout_secs must be between 1 and {MAX_TASK_TIMEOUT_SECS}, got {}",
                self.task_timeout_secs
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.backoff.base_ms > self.backoff.max_ms {
            return Err(ConfigError::Invalid(format!(
                "backoff.base_ms ({}) exceeds backoff.max_ms ({})",
                self.backoff.base_ms, self.backoff.max_ms
            )));
        }
        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.api_base)
            .map_err(|err| ConfigError::Invalid(format!("api_base {:?}: {err}", self.api_base)))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api_base {:?} cannot carry a path",
                self.api_base
            )));
        }
        Ok(url)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}
