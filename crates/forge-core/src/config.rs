//! SyncConfig - TOML 設定
//!
//! 全セクション省略可。省略したフィールドはデフォルト値になる。
//!
//! ```toml
//! [queue]
//! storage_key = "offline_queue"
//! settle_delay_ms = 2000
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 2000
//! multiplier = 2.0
//!
//! [api]
//! base_url = "http://127.0.0.1:3000"
//! user_id = "user-123"
//!
//! [store]
//! dir = ".forge"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::queue::{DEFAULT_STORAGE_KEY, QueueOptions, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub queue: QueueSection,
    pub retry: RetrySection,
    pub api: ApiSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub storage_key: String,
    /// 再接続後、sync を始めるまで待つ時間
    pub settle_delay_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            settle_delay_ms: 2_000,
        }
    }
}

/// `max_attempts` 省略 = 無制限（従来どおり）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::unbounded();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: 0,
            multiplier: policy.multiplier,
            max_delay_ms: u64::try_from(policy.max_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub user_id: String,
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            user_id: String::new(),
            token: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".forge"),
        }
    }
}

impl SyncConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("queue.storage_key must not be empty".into()));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1.0".into()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            multiplier: self.retry.multiplier,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.queue.settle_delay_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            storage_key: self.queue.storage_key.clone(),
            user_id: self.api.user_id.clone(),
            retry: self.retry_policy(),
        }
    }
}
