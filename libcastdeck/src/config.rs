//! Configuration management for Castdeck
//!
//! Configuration lives in a TOML file. Every section has defaults, so an
//! empty file (or no file at all, via [`Config::load_or_default`]) yields a
//! working local setup.
//!
//! ```toml
//! [database]
//! path = "~/.local/share/castdeck/castdeck.db"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [dispatch]
//! poll_interval = 30
//! max_attempts = 3
//! publish_timeout = 10
//!
//! [media]
//! dir = "~/.local/share/castdeck/media"
//! max_bytes = 104857600
//!
//! [platforms.twitter]
//! api_base = "https://api.twitter.com"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub media: MediaConfig,
    /// Per-platform settings keyed by platform name
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Media library storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded files are written to; `~` is expanded
    #[serde(default = "default_media_dir")]
    pub dir: String,
    /// Largest accepted upload in bytes
    #[serde(default = "default_media_max_bytes")]
    pub max_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            max_bytes: default_media_max_bytes(),
        }
    }
}

impl MediaConfig {
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir).to_string())
    }
}

/// Dispatch loop tuning. All durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout: u64,
    /// Base delay before retrying a retryable failure; doubles per attempt
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    /// Age after which an unfinished claim is treated as abandoned
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl: u64,
    #[serde(default = "default_metrics_refresh_interval")]
    pub metrics_refresh_interval: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            publish_timeout: default_publish_timeout(),
            retry_delay: default_retry_delay(),
            claim_ttl: default_claim_ttl(),
            metrics_refresh_interval: default_metrics_refresh_interval(),
        }
    }
}

impl DispatchConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn claim_ttl(&self) -> chrono::Duration {
        span(self.claim_ttl)
    }

    pub fn retry_delay(&self) -> chrono::Duration {
        span(self.retry_delay)
    }

    pub fn metrics_refresh_interval(&self) -> chrono::Duration {
        span(self.metrics_refresh_interval)
    }
}

/// Seconds as a calendar span, capped at `u32::MAX` seconds
///
/// Callers adding a multiple of a span to a timestamp still need checked
/// arithmetic.
fn span(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::from(u32::try_from(secs).unwrap_or(u32::MAX)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Override for the platform's API base URL (sandbox or proxy)
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: None,
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/castdeck/castdeck.db".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_media_dir() -> String {
    "~/.local/share/castdeck/media".to_string()
}

fn default_media_max_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_poll_interval() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_publish_timeout() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    60
}

fn default_claim_ttl() -> u64 {
    300
}

fn default_metrics_refresh_interval() -> u64 {
    900
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from the default location, falling back to
    /// defaults when no file exists there
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the dispatcher cannot work with
    pub fn validate(&self) -> Result<()> {
        let d = &self.dispatch;
        let checks: [(&str, bool, &str); 5] = [
            ("dispatch.poll_interval", d.poll_interval >= 1, "must be at least 1 second"),
            ("dispatch.batch_size", d.batch_size >= 1, "must be at least 1"),
            ("dispatch.max_attempts", d.max_attempts >= 1, "must be at least 1"),
            ("dispatch.publish_timeout", d.publish_timeout >= 1, "must be at least 1 second"),
            ("dispatch.claim_ttl", d.claim_ttl > d.publish_timeout, "must exceed publish_timeout"),
        ];

        for (field, ok, reason) in checks {
            if !ok {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: reason.to_string(),
                }
                .into());
            }
        }

        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }

        if self.media.dir.trim().is_empty() {
            return Err(ConfigError::MissingField("media.dir".to_string()).into());
        }
        if self.media.max_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "media.max_bytes".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Settings for one platform, defaulted when the section is absent
    pub fn platform(&self, name: &str) -> PlatformConfig {
        self.platforms.get(name).cloned().unwrap_or_default()
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CASTDECK_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("castdeck").join("config.toml"))
}

/// Resolve the database path
///
/// `CASTDECK_DB_PATH` wins over the configured path; `~` is expanded.
pub fn resolve_db_path(configured: Option<&str>) -> Result<PathBuf> {
    let raw = match std::env::var("CASTDECK_DB_PATH") {
        Ok(path) if !path.trim().is_empty() => path,
        _ => configured
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingField("database.path".to_string()))?,
    };

    Ok(PathBuf::from(shellexpand::tilde(&raw).to_string()))
}
