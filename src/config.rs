//! Configuration management for the Instapaper client.
//!
//! This module provides a centralized configuration system that enables:
//! - Type-safe configuration management
//! - Environment variable integration
//! - Builder pattern for easy setup
//! - Configuration validation
//!
//! Request timeouts belong to the HTTP transport; the client core adds none of its own.
//!
//! ## Usage
//!
//! ```rust
//! use instapaper_rs::config::{Config, HttpConfig, ReachabilityConfig};
//! use instapaper_rs::Result;
//!
//! fn example() -> Result<()> {
//!     // Create default configuration
//!     let config = Config::default();
//!
//!     // Build custom configuration
//!     let config = Config::builder()
//!         .http(HttpConfig::builder()
//!             .request_timeout_secs(60)
//!             .build())
//!         .reachability(ReachabilityConfig::builder()
//!             .poll_interval_secs(30)
//!             .build())
//!         .build();
//!     config.validate()?;
//!
//!     // Load from environment variables
//!     let config = Config::from_env()?;
//!     Ok(())
//! }
//! ```

use crate::error::{InstapaperError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default keychain service identifier for the stored account.
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "instapaper-rs.account";

/// Directory under the platform data directory that holds the queue file.
const DATA_DIR_NAME: &str = "instapaper-rs";

/// Default queue file: `<local data dir>/instapaper-rs/queue.json`.
///
/// Falls back to the temp directory only on hosts with no data directory.
pub fn default_queue_path() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(DATA_DIR_NAME)
        .join("queue.json")
}

/// Main configuration structure for the Instapaper client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP transport configuration
    pub http: HttpConfig,
    /// Credential and queue storage configuration
    pub storage: StorageConfig,
    /// Reachability monitoring configuration
    pub reachability: ReachabilityConfig,
}

/// HTTP client configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30)
    pub request_timeout_secs: u64,
    /// Connection timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,
    /// Base URL for the Instapaper API (default: "https://www.instapaper.com")
    pub base_url: String,
    /// User agent string for requests
    pub user_agent: String,
}

/// Storage configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File holding the pending submission queue
    pub queue_path: PathBuf,
    /// Keychain service identifier for the stored account
    pub keychain_service: String,
}

/// Reachability monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    /// Host probed for connectivity (default: "www.instapaper.com")
    pub probe_host: String,
    /// Port probed for connectivity (default: 443)
    pub probe_port: u16,
    /// Seconds between probes (default: 15)
    pub poll_interval_secs: u64,
    /// Probe connection timeout in seconds (default: 5)
    pub probe_timeout_secs: u64,
    /// Whether to add jitter to the poll interval (default: true)
    pub enable_jitter: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            base_url: "https://www.instapaper.com".to_string(),
            user_agent: format!("instapaper-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            queue_path: default_queue_path(),
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
        }
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            probe_host: "www.instapaper.com".to_string(),
            probe_port: 443,
            poll_interval_secs: 15,
            probe_timeout_secs: 5,
            enable_jitter: true,
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // HTTP settings
        if let Ok(val) = std::env::var("INSTAPAPER_BASE_URL") {
            config.http.base_url = val;
        }

        if let Ok(val) = std::env::var("INSTAPAPER_REQUEST_TIMEOUT") {
            config.http.request_timeout_secs = val.parse().map_err(|_| {
                InstapaperError::config_error("Invalid INSTAPAPER_REQUEST_TIMEOUT value")
            })?;
        }

        if let Ok(val) = std::env::var("INSTAPAPER_CONNECT_TIMEOUT") {
            config.http.connect_timeout_secs = val.parse().map_err(|_| {
                InstapaperError::config_error("Invalid INSTAPAPER_CONNECT_TIMEOUT value")
            })?;
        }

        // Storage settings
        if let Ok(val) = std::env::var("INSTAPAPER_QUEUE_PATH") {
            config.storage.queue_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("INSTAPAPER_KEYCHAIN_SERVICE") {
            config.storage.keychain_service = val;
        }

        // Reachability settings
        if let Ok(val) = std::env::var("INSTAPAPER_POLL_INTERVAL") {
            config.reachability.poll_interval_secs = val.parse().map_err(|_| {
                InstapaperError::config_error("Invalid INSTAPAPER_POLL_INTERVAL value")
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency and constraints.
    pub fn validate(&self) -> Result<()> {
        // Validate HTTP settings
        if self.http.request_timeout_secs == 0 {
            return Err(InstapaperError::config_error(
                "request_timeout_secs must be greater than 0",
            ));
        }

        if self.http.connect_timeout_secs == 0 {
            return Err(InstapaperError::config_error(
                "connect_timeout_secs must be greater than 0",
            ));
        }

        let base_url = url::Url::parse(&self.http.base_url).map_err(|e| {
            InstapaperError::config_error(format!("base_url is not a valid URL: {e}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(InstapaperError::config_error(
                "base_url must use http:// or https://",
            ));
        }

        // Validate storage settings
        if self.storage.keychain_service.trim().is_empty() {
            return Err(InstapaperError::config_error(
                "keychain_service cannot be empty",
            ));
        }

        if self.storage.queue_path.as_os_str().is_empty() {
            return Err(InstapaperError::config_error("queue_path cannot be empty"));
        }

        // Validate reachability settings
        if self.reachability.probe_host.is_empty() {
            return Err(InstapaperError::config_error("probe_host cannot be empty"));
        }

        if self.reachability.poll_interval_secs == 0 {
            return Err(InstapaperError::config_error(
                "poll_interval_secs must be greater than 0",
            ));
        }

        if self.reachability.probe_timeout_secs == 0 {
            return Err(InstapaperError::config_error(
                "probe_timeout_secs must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Converts HTTP timeout to Duration types for easier use.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    /// Converts HTTP timeout to Duration types for easier use.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_secs)
    }
}

impl ReachabilityConfig {
    /// Interval between two connectivity probes.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Timeout of a single connectivity probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Builder for creating Config instances.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    http: Option<HttpConfig>,
    storage: Option<StorageConfig>,
    reachability: Option<ReachabilityConfig>,
}

impl ConfigBuilder {
    /// Sets the HTTP configuration.
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the reachability configuration.
    pub fn reachability(mut self, reachability: ReachabilityConfig) -> Self {
        self.reachability = Some(reachability);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Config {
        Config {
            http: self.http.unwrap_or_default(),
            storage: self.storage.unwrap_or_default(),
            reachability: self.reachability.unwrap_or_default(),
        }
    }
}

// Builder implementations for individual config sections

impl HttpConfig {
    /// Creates a new HTTP config builder.
    pub fn builder() -> HttpConfigBuilder {
        HttpConfigBuilder::default()
    }
}

impl StorageConfig {
    /// Creates a new storage config builder.
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }
}

impl ReachabilityConfig {
    /// Creates a new reachability config builder.
    pub fn builder() -> ReachabilityConfigBuilder {
        ReachabilityConfigBuilder::default()
    }
}

/// Builder for HttpConfig.
#[derive(Debug, Default)]
pub struct HttpConfigBuilder {
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    base_url: Option<String>,
    user_agent: Option<String>,
}

impl HttpConfigBuilder {
    pub fn request_timeout_secs(mut self, timeout: u64) -> Self {
        self.request_timeout_secs = Some(timeout);
        self
    }

    pub fn connect_timeout_secs(mut self, timeout: u64) -> Self {
        self.connect_timeout_secs = Some(timeout);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> HttpConfig {
        let default = HttpConfig::default();
        HttpConfig {
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(default.request_timeout_secs),
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(default.connect_timeout_secs),
            base_url: self.base_url.unwrap_or(default.base_url),
            user_agent: self.user_agent.unwrap_or(default.user_agent),
        }
    }
}

/// Builder for StorageConfig.
#[derive(Debug, Default)]
pub struct StorageConfigBuilder {
    queue_path: Option<PathBuf>,
    keychain_service: Option<String>,
}

impl StorageConfigBuilder {
    pub fn queue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_path = Some(path.into());
        self
    }

    pub fn keychain_service(mut self, service: impl Into<String>) -> Self {
        self.keychain_service = Some(service.into());
        self
    }

    pub fn build(self) -> StorageConfig {
        let default = StorageConfig::default();
        StorageConfig {
            queue_path: self.queue_path.unwrap_or(default.queue_path),
            keychain_service: self.keychain_service.unwrap_or(default.keychain_service),
        }
    }
}

/// Builder for ReachabilityConfig.
#[derive(Debug, Default)]
pub struct ReachabilityConfigBuilder {
    probe_host: Option<String>,
    probe_port: Option<u16>,
    poll_interval_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    enable_jitter: Option<bool>,
}

impl ReachabilityConfigBuilder {
    pub fn probe_host(mut self, host: impl Into<String>) -> Self {
        self.probe_host = Some(host.into());
        self
    }

    pub fn probe_port(mut self, port: u16) -> Self {
        self.probe_port = Some(port);
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = Some(secs);
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = Some(secs);
        self
    }

    pub fn enable_jitter(mut self, enable: bool) -> Self {
        self.enable_jitter = Some(enable);
        self
    }

    pub fn build(self) -> ReachabilityConfig {
        let default = ReachabilityConfig::default();
        ReachabilityConfig {
            probe_host: self.probe_host.unwrap_or(default.probe_host),
            probe_port: self.probe_port.unwrap_or(default.probe_port),
            poll_interval_secs: self
                .poll_interval_secs
                .unwrap_or(default.poll_interval_secs),
            probe_timeout_secs: self
                .probe_timeout_secs
                .unwrap_or(default.probe_timeout_secs),
            enable_jitter: self.enable_jitter.unwrap_or(default.enable_jitter),
        }
    }
}
