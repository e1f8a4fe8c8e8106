use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub dispatch: Option<DispatchConfig>,
    #[serde(default)]
    pub providers: Option<ProvidersConfig>,
}

pub const DEFAULT_CONFIG_PATH: &str = "notifyd.toml";

impl Config {
    /// Reads a TOML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_required(path)
    }

    /// Like [`Config::load`], but the file must exist.
    pub fn load_required(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config '{}'", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn store(&self) -> StoreConfig {
        self.store.clone().unwrap_or_default()
    }

    pub fn dispatch(&self) -> DispatchConfig {
        self.dispatch.clone().unwrap_or_default()
    }

    pub fn providers(&self) -> ProvidersConfig {
        self.providers.clone().unwrap_or_default()
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|logging| logging.level.as_deref())
            .unwrap_or("info")
    }

    pub fn log_json(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|logging| logging.json)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub max_body_bytes: Option<usize>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RateLimitConfig {
    #[serde(alias = "requests_per_minute")]
    pub notifications_per_minute: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
    pub redis_url: Option<String>,
    pub retention_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

impl StoreConfig {
    pub fn backend(&self) -> StoreBackend {
        self.backend.unwrap_or_default()
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs.unwrap_or(3600).max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.unwrap_or(300).max(1))
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DispatchConfig {
    pub workers: Option<usize>,
    pub max_attempts: Option<usize>,
    pub base_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl DispatchConfig {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(4).max(1)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts.unwrap_or(1).max(1)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms.unwrap_or(200))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.unwrap_or(5_000))
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ProvidersConfig {
    pub email: Option<EmailProviderConfig>,
    pub sms: Option<SmsProviderConfig>,
    pub push: Option<PushProviderConfig>,
    #[serde(alias = "slack")]
    pub chat: Option<ChatProviderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailProviderConfig {
    pub smtp_host: String,
    pub smtp_port: Option<u16>,
    pub username: Option<String>,
    pub password_env: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    pub use_tls: Option<bool>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmsProviderConfig {
    pub endpoint: Option<String>,
    pub account_sid: String,
    pub auth_token_env: Option<String>,
    pub from_number: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushProviderConfig {
    pub endpoint: Option<String>,
    pub server_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatProviderConfig {
    pub webhook_url: String,
    pub default_username: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

pub fn provider_timeout(timeout_secs: Option<u64>) -> Duration {
    Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS).max(1))
}
