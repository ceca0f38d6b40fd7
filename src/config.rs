use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::retry::{
    exponential_backoff, limit_retry, linear_backoff, no_retry, RetryStrategy,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

/// ロッククライアントの設定。
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_ttl_ms() -> u64 {
    30_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key_prefix: None,
            default_ttl_ms: default_ttl_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl LockConfig {
    /// YAML ファイルを読み込み、バリデーション済みの設定を返す。
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::Validation("redis_url is required".into()));
        }
        if self.key_prefix.as_deref() == Some("") {
            return Err(ConfigError::Validation(
                "key_prefix must not be empty when set".into(),
            ));
        }
        if self.default_ttl_ms == 0 {
            return Err(ConfigError::Validation(
                "default_ttl_ms must be > 0".into(),
            ));
        }
        self.retry.validate()
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    #[default]
    None,
    Linear,
    Exponential,
}

/// リトライ戦略の設定。
///
/// 戦略は状態を持つことがあるため、設定そのものではなく
/// [`RetryConfig::build`] で取得処理ごとに新しいインスタンスを作って使う。
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RetryConfig {
    #[serde(default)]
    pub kind: RetryKind,
    /// linear の待機間隔
    #[serde(default)]
    pub delay_ms: u64,
    /// exponential の下限
    #[serde(default)]
    pub min_delay_ms: u64,
    /// exponential の上限（0 は上限なし）
    #[serde(default)]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            RetryKind::None => Ok(()),
            RetryKind::Linear if self.delay_ms == 0 => Err(ConfigError::Validation(
                "retry.delay_ms must be > 0 for linear backoff".into(),
            )),
            RetryKind::Linear => Ok(()),
            RetryKind::Exponential
                if self.max_delay_ms != 0 && self.max_delay_ms < self.min_delay_ms =>
            {
                Err(ConfigError::Validation(
                    "retry.max_delay_ms must be >= retry.min_delay_ms".into(),
                ))
            }
            RetryKind::Exponential => Ok(()),
        }
    }

    /// 新しい戦略インスタンスを生成する。
    pub fn build(&self) -> Box<dyn RetryStrategy> {
        let strategy: Box<dyn RetryStrategy> = match self.kind {
            RetryKind::None => Box::new(no_retry()),
            RetryKind::Linear => Box::new(linear_backoff(Duration::from_millis(self.delay_ms))),
            RetryKind::Exponential => Box::new(exponential_backoff(
                Duration::from_millis(self.min_delay_ms),
                Duration::from_millis(self.max_delay_ms),
            )),
        };
        match self.max_attempts {
            Some(max) => Box::new(limit_retry(strategy, max)),
            None => strategy,
        }
    }
}
