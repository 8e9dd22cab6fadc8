//! Configuration for tunefeed-ingest
//!
//! **Priority:** CLI → environment (`TUNEFEED_*`) → TOML → defaults.
//!
//! The TOML file and compiled defaults are merged by serde; environment
//! overrides are applied by [`IngestConfig::apply_env_overrides`]; CLI flags
//! are applied last by the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tunefeed_common::config::{
    env_flag, env_override, load_toml_or_default, resolve_config_path, LoggingConfig,
};
use tunefeed_common::{Error, Result};

use crate::services::feed_client::DEFAULT_FEED_BASE_URL;
use crate::services::regional_classifier::ClassifierRules;
use crate::services::track_fetcher::FetcherConfig;
use crate::services::waveform_synthesizer::MAX_DURATION_SECONDS;

pub const CONFIG_FILE_NAME: &str = "tunefeed-ingest.toml";
pub const CONFIG_ENV_VAR: &str = "TUNEFEED_CONFIG";

/// Full service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub feed: FeedConfig,
    pub classifier: ClassifierRules,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Audio storage directory
    pub path: PathBuf,
    /// URL prefix under which stored files are served
    pub public_prefix: String,
    /// Length of per-track synthesized fallbacks
    pub fallback_seconds: u32,
    /// Length of the shared generic fallback
    pub generic_fallback_seconds: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("uploads/audio"),
            public_prefix: "/audio".to_string(),
            fallback_seconds: 30,
            generic_fallback_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Initial state of the runtime download toggle
    pub enabled: bool,
    /// Total download attempts per preview URL
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub deny_hosts: Vec<String>,
    /// Largest accepted preview body in bytes
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let defaults = FetcherConfig::default();
        Self {
            enabled: true,
            max_retries: defaults.max_attempts,
            retry_delay_ms: defaults.retry_delay.as_millis() as u64,
            timeout_secs: defaults.timeout.as_secs(),
            deny_hosts: defaults.deny_hosts,
            max_bytes: defaults.max_bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub search_limit: u32,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            search_limit: 100,
            timeout_secs: 30,
        }
    }
}

impl IngestConfig {
    /// Resolve, load and validate configuration
    ///
    /// A missing file yields defaults; a malformed file is an error.
    pub fn load(cli_config: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_config, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        if let Some(p) = &path {
            info!(path = %p.display(), "Loading configuration");
        }

        let mut config: IngestConfig = load_toml_or_default(path.as_deref())?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TUNEFEED_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(host) = env_override::<String>("TUNEFEED_HOST")? {
            self.server.host = host;
        }
        if let Some(port) = env_override("TUNEFEED_PORT")? {
            self.server.port = port;
        }
        if let Some(level) = env_override::<String>("TUNEFEED_LOG_LEVEL")? {
            self.logging.level = level;
        }
        if let Some(path) = env_override::<PathBuf>("TUNEFEED_STORAGE_PATH")? {
            self.storage.path = path;
        }
        if let Some(prefix) = env_override::<String>("TUNEFEED_PUBLIC_PREFIX")? {
            self.storage.public_prefix = prefix;
        }
        if let Some(enabled) = env_flag("TUNEFEED_AUDIO_DOWNLOAD")? {
            self.fetch.enabled = enabled;
        }
        if let Some(retries) = env_override("TUNEFEED_FETCH_MAX_RETRIES")? {
            self.fetch.max_retries = retries;
        }
        if let Some(url) = env_override::<String>("TUNEFEED_FEED_BASE_URL")? {
            self.feed.base_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.storage.public_prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "storage.public_prefix must start with '/': {}",
                self.storage.public_prefix
            )));
        }
        for (name, seconds) in [
            ("storage.fallback_seconds", self.storage.fallback_seconds),
            ("storage.generic_fallback_seconds", self.storage.generic_fallback_seconds),
        ] {
            if seconds == 0 || seconds > MAX_DURATION_SECONDS {
                return Err(Error::Config(format!(
                    "{} must be between 1 and {}: {}",
                    name, MAX_DURATION_SECONDS, seconds
                )));
            }
        }
        if self.fetch.max_bytes == 0 {
            return Err(Error::Config("fetch.max_bytes must be positive".to_string()));
        }
        if self.fetch.max_retries == 0 {
            return Err(Error::Config("fetch.max_retries must be at least 1".to_string()));
        }
        if self.classifier.threshold < 0.0 || !self.classifier.threshold.is_finite() {
            return Err(Error::Config(format!(
                "classifier.threshold must be a non-negative number: {}",
                self.classifier.threshold
            )));
        }
        Ok(())
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            max_attempts: self.fetch.max_retries,
            retry_delay: tunefeed_common::time::millis_to_duration(self.fetch.retry_delay_ms),
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            deny_hosts: self.fetch.deny_hosts.clone(),
            max_bytes: self.fetch.max_bytes,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
