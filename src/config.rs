//! Configuration file parser for ~/.config/tickerfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde but logged, since they are usually typos.
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides `api_key` from the file.
pub const API_KEY_ENV: &str = "TICKERFEED_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every field has a default, so any subset of keys can be given.
/// The API key is kept as a [`SecretString`] and masked in `Debug` output.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the news backend.
    pub api_base_url: String,

    /// Backend API key. The `TICKERFEED_API_KEY` env var takes precedence.
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,

    /// Items requested per page.
    pub page_limit: u32,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries for rate-limited, timed-out or 5xx requests.
    pub max_retries: u32,

    /// Decoded responses kept in memory (0 disables the cache).
    pub cache_capacity: usize,

    /// Articles shown in the home news section.
    pub home_news_count: usize,

    /// Videos shown in the home video section.
    pub home_video_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://signal.up.railway.app".to_string(),
            api_key: None,
            page_limit: crate::port::DEFAULT_PAGE_LIMIT,
            request_timeout_secs: 30,
            max_retries: 3,
            cache_capacity: 64,
            home_news_count: 5,
            home_video_count: 4,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("page_limit", &self.page_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("cache_capacity", &self.cache_capacity)
            .field("home_news_count", &self.home_news_count)
            .field("home_video_count", &self.home_video_count)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "api_base_url",
        "api_key",
        "page_limit",
        "request_timeout_secs",
        "max_retries",
        "cache_capacity",
        "home_news_count",
        "home_video_count",
    ];

    /// Default location: `~/.config/tickerfeed/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("tickerfeed")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        Self::parse(&content)
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(base_url = %config.api_base_url, page_limit = config.page_limit, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_limit == 0 || self.page_limit > 100 {
            return Err(ConfigError::Invalid {
                key: "page_limit",
                reason: format!("{} is outside 1..=100", self.page_limit),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment overrides (currently the API key).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::debug!("Using API key from environment");
                self.api_key = Some(SecretString::from(key));
            }
        }
        self
    }

    /// API key as a header value, if one is configured.
    pub(crate) fn bearer_token(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|key| format!("Bearer {}", key.expose_secret()))
    }
}

// ============================================================================
// Tests
// ============================================================================
