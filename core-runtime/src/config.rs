//! # Bridge Configuration
//!
//! Settings shared by every core crate: where the cloud API and the local
//! daemon live, how often the status poller ticks, and how the secure storage
//! namespaces its keys.
//!
//! ## Overview
//!
//! The configuration uses a builder that validates fail-fast: malformed URLs,
//! a zero poll interval or an empty namespace are rejected at startup instead
//! of surfacing later as opaque transport errors.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::BridgeConfig;
//! use std::time::Duration;
//!
//! let config = BridgeConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .poll_interval(Duration::from_secs(3))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.daemon_base_url, "http://127.0.0.1:1777");
//! ```
//!
//! ## Entry mirrors
//!
//! `entry_sources` lists mirror URLs serving a sealed document that names the
//! current cloud API entry. `entry_key` is the hex AES-256 key that opens it.
//! With no mirrors the client talks to `api_base_url` directly.
//!
//! ## Environment overrides
//!
//! [`BridgeConfigBuilder::with_env_overrides`] applies `K2_DAEMON_PORT` and
//! `K2_API_BASE_URL` when they are set and well-formed. An API base URL from
//! the environment also disables the entry mirrors.

use crate::error::{Error, Result};
use std::time::Duration;
use url::Url;

/// Default cloud API entry point.
pub const DEFAULT_API_BASE_URL: &str = "https://w.app.52j.me";

/// Default port of the local daemon's HTTP server.
pub const DEFAULT_DAEMON_PORT: u16 = 1777;

/// Default status poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Lower bound for the poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout for local daemon requests.
pub const DEFAULT_DAEMON_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for cloud API requests.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Mirrors serving the sealed entry document.
pub const DEFAULT_ENTRY_SOURCES: [&str; 2] = [
    "https://cdn.jsdelivr.net/gh/kaitu-io/ui-theme@dist/config.js",
    "https://cdn.statically.io/gh/kaitu-io/ui-theme/dist/config.js",
];

/// AES-256 key of the entry document, hex encoded.
pub const DEFAULT_ENTRY_KEY: &str =
    "9e3573184d5e5b3034a087c33fa2cdb76bd0126238ed08f54d1de8c6ae0eb4ba";

/// Default event bus capacity.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Runtime settings for the bridge core.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Cloud API base URL (login, refresh, profile). Also the fallback when
    /// no entry mirror answers.
    pub api_base_url: String,

    /// Mirrors consulted for the current cloud API entry. Empty disables
    /// entry resolution.
    pub entry_sources: Vec<String>,

    /// Hex-encoded 32-byte key of the entry document.
    pub entry_key: String,

    /// Standalone daemon base URL (`POST /core`, `GET /api/device/udid`).
    pub daemon_base_url: String,

    /// Interval between status polls.
    pub poll_interval: Duration,

    /// Secure storage namespace. `None` uses the default `_k2_secure_` prefix.
    pub storage_namespace: Option<String>,

    /// Broadcast capacity of the event bus.
    pub event_buffer_size: usize,

    /// Timeout applied to local daemon requests.
    pub daemon_timeout: Duration,

    /// Timeout applied to cloud API requests.
    pub api_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            entry_sources: DEFAULT_ENTRY_SOURCES.iter().map(|s| s.to_string()).collect(),
            entry_key: DEFAULT_ENTRY_KEY.to_string(),
            daemon_base_url: format!("http://127.0.0.1:{}", DEFAULT_DAEMON_PORT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            storage_namespace: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            daemon_timeout: DEFAULT_DAEMON_TIMEOUT,
            api_timeout: DEFAULT_API_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    /// Creates a new builder for constructing a `BridgeConfig`.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Both base URLs and every entry mirror parse and use http(s)
    /// - The entry key is 64 hex characters
    /// - The poll interval is at least [`MIN_POLL_INTERVAL`]
    /// - The storage namespace, when set, is non-empty alphanumeric/underscore
    /// - The event buffer and timeouts are non-zero
    pub fn validate(&self) -> Result<()> {
        validate_base_url("api_base_url", &self.api_base_url)?;
        validate_base_url("daemon_base_url", &self.daemon_base_url)?;
        for source in &self.entry_sources {
            validate_base_url("entry_sources", source)?;
        }

        if self.entry_key.len() != 64 || !self.entry_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Config(
                "Entry key must be 64 hex characters".to_string(),
            ));
        }

        if self.poll_interval < MIN_POLL_INTERVAL {
            return Err(Error::Config(format!(
                "Poll interval must be at least {} ms",
                MIN_POLL_INTERVAL.as_millis()
            )));
        }

        if let Some(namespace) = &self.storage_namespace {
            if namespace.is_empty()
                || !namespace
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(Error::Config(format!(
                    "Storage namespace '{}' must be non-empty and contain only [A-Za-z0-9_-]",
                    namespace
                )));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.daemon_timeout.is_zero() || self.api_timeout.is_zero() {
            return Err(Error::Config("Timeouts must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Resolve an API path against the cloud base URL.
    pub fn api_url(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }

    /// Resolve a daemon path against the daemon base URL.
    pub fn daemon_url(&self, path: &str) -> String {
        join_url(&self.daemon_base_url, path)
    }
}

fn validate_base_url(field: &str, value: &str) -> Result<()> {
    let parsed = Url::parse(value)
        .map_err(|e| Error::Config(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builder for constructing [`BridgeConfig`] instances.
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    api_base_url: Option<String>,
    entry_sources: Option<Vec<String>>,
    entry_key: Option<String>,
    daemon_base_url: Option<String>,
    poll_interval: Option<Duration>,
    storage_namespace: Option<String>,
    event_buffer_size: Option<usize>,
    daemon_timeout: Option<Duration>,
    api_timeout: Option<Duration>,
}

impl BridgeConfigBuilder {
    /// Sets the cloud API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the entry mirrors. An empty list pins the client to the API base URL.
    pub fn entry_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn entry_key(mut self, key_hex: impl Into<String>) -> Self {
        self.entry_key = Some(key_hex.into());
        self
    }

    /// Sets the standalone daemon base URL.
    pub fn daemon_base_url(mut self, url: impl Into<String>) -> Self {
        self.daemon_base_url = Some(url.into());
        self
    }

    /// Sets the status poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets a custom secure storage namespace (`_k2_<namespace>_` prefix).
    pub fn storage_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.storage_namespace = Some(namespace.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn daemon_timeout(mut self, timeout: Duration) -> Self {
        self.daemon_timeout = Some(timeout);
        self
    }

    pub fn api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = Some(timeout);
        self
    }

    /// Apply `K2_DAEMON_PORT` and `K2_API_BASE_URL` from the process environment.
    ///
    /// Explicit builder values set before this call are overridden; malformed
    /// values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("K2_DAEMON_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.daemon_base_url = Some(format!("http://127.0.0.1:{}", port));
        }
        if let Some(url) = lookup("K2_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.api_base_url = Some(url);
            self.entry_sources = Some(Vec::new());
        }
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when validation fails.
    pub fn build(self) -> Result<BridgeConfig> {
        let defaults = BridgeConfig::default();

        let config = BridgeConfig {
            api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
            entry_sources: self.entry_sources.unwrap_or(defaults.entry_sources),
            entry_key: self.entry_key.unwrap_or(defaults.entry_key),
            daemon_base_url: self.daemon_base_url.unwrap_or(defaults.daemon_base_url),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            storage_namespace: self.storage_namespace,
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
            daemon_timeout: self.daemon_timeout.unwrap_or(defaults.daemon_timeout),
            api_timeout: self.api_timeout.unwrap_or(defaults.api_timeout),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::builder().build().unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.daemon_base_url, "http://127.0.0.1:1777");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.storage_namespace.is_none());
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = BridgeConfig::builder()
            .api_base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("api_base_url")));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = BridgeConfig::builder()
            .daemon_base_url("ftp://127.0.0.1")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("http or https")));
    }

    #[test]
    fn test_rejects_too_short_poll_interval() {
        let result = BridgeConfig::builder()
            .poll_interval(Duration::from_millis(10))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_namespace() {
        assert!(BridgeConfig::builder().storage_namespace("").build().is_err());
        assert!(BridgeConfig::builder()
            .storage_namespace("has space")
            .build()
            .is_err());
        assert!(BridgeConfig::builder()
            .storage_namespace("profile_2")
            .build()
            .is_ok());
    }

    #[test]
    fn test_entry_settings() {
        let defaults = BridgeConfig::default();
        assert_eq!(defaults.entry_sources.len(), 2);
        assert_eq!(defaults.entry_key, DEFAULT_ENTRY_KEY);

        let pinned = BridgeConfig::builder()
            .entry_sources(Vec::<String>::new())
            .build()
            .unwrap();
        assert!(pinned.entry_sources.is_empty());

        let err = BridgeConfig::builder()
            .entry_sources(["file:///etc/entry.js"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("entry_sources")));

        assert!(BridgeConfig::builder().entry_key("abcd").build().is_err());
        assert!(BridgeConfig::builder()
            .entry_key("zz".repeat(32))
            .build()
            .is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("K2_DAEMON_PORT", "18080"),
            ("K2_API_BASE_URL", "https://api.example.org"),
        ]
        .into_iter()
        .collect();

        let config = BridgeConfig::builder()
            .with_overrides_from(|name| env.get(name).map(|v| v.to_string()))
            .build()
            .unwrap();

        assert_eq!(config.daemon_base_url, "http://127.0.0.1:18080");
        assert_eq!(config.api_base_url, "https://api.example.org");
        assert!(config.entry_sources.is_empty());
    }

    #[test]
    fn test_malformed_port_is_ignored() {
        let config = BridgeConfig::builder()
            .with_overrides_from(|name| (name == "K2_DAEMON_PORT").then(|| "abc".to_string()))
            .build()
            .unwrap();

        assert_eq!(config.daemon_base_url, "http://127.0.0.1:1777");
    }

    #[test]
    fn test_url_joining() {
        let config = BridgeConfig::builder()
            .api_base_url("https://api.example.com/")
            .build()
            .unwrap();

        assert_eq!(
            config.api_url("/api/user/info"),
            "https://api.example.com/api/user/info"
        );
        assert_eq!(config.daemon_url("core"), "http://127.0.0.1:1777/core");
    }
}
