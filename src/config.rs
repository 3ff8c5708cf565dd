//! Client configuration.
//!
//! Use the builder methods to customize, or [`NotifyConfig::from_env`] to
//! read overrides from the environment.
//!
//! ```ignore
//! use teamnotify::config::{NotifyConfig, TransportKind};
//!
//! let config = NotifyConfig::default()
//!     .with_api_base_url("https://api.example.com/v0")
//!     .with_transport(TransportKind::EventSource);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::stream::{BackoffConfig, StreamSettings};

pub const API_URL_ENV: &str = "TEAMNOTIFY_API_URL";
pub const SSE_METHOD_ENV: &str = "TEAMNOTIFY_SSE_METHOD";
pub const HEARTBEAT_TIMEOUT_ENV: &str = "TEAMNOTIFY_HEARTBEAT_TIMEOUT_SECS";
pub const CREDENTIALS_ENV: &str = "TEAMNOTIFY_CREDENTIALS";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/v0";

/// Which wire strategy the stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// `eventsource-client`, token in the `?token=` query parameter.
    EventSource,
    /// Manual chunk decoding, token in the `Authorization` header.
    #[default]
    ChunkedStream,
}

impl TransportKind {
    /// `eventsource` selects [`TransportKind::EventSource`]; anything else
    /// selects the chunked stream.
    pub fn from_setting(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("eventsource") {
            TransportKind::EventSource
        } else {
            TransportKind::ChunkedStream
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Base URL every endpoint path is appended to
    pub api_base_url: String,
    pub transport: TransportKind,
    pub backoff: BackoffConfig,
    /// Tokens expiring within this many seconds count as expired
    pub expiry_buffer_secs: i64,
    pub heartbeat_timeout: Duration,
    /// Pause between teardown and reconnect
    pub settle_delay: Duration,
    /// How long before expiry the scheduler renews
    pub proactive_refresh_lead: Duration,
    /// Credential file; `None` means `~/.teamnotify/credentials.json`
    pub credentials_path: Option<PathBuf>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            transport: TransportKind::default(),
            backoff: BackoffConfig::default(),
            expiry_buffer_secs: 5,
            heartbeat_timeout: Duration::from_secs(45),
            settle_delay: Duration::from_millis(100),
            proactive_refresh_lead: Duration::from_secs(60),
            credentials_path: None,
        }
    }
}

impl NotifyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with overrides from `TEAMNOTIFY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from `lookup`. Unparseable values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config = config.with_api_base_url(url);
        }
        if let Some(method) = lookup(SSE_METHOD_ENV) {
            config.transport = TransportKind::from_setting(&method);
        }
        if let Some(secs) = lookup(HEARTBEAT_TIMEOUT_ENV).and_then(|v| v.trim().parse().ok()) {
            config.heartbeat_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(CREDENTIALS_ENV).filter(|v| !v.trim().is_empty()) {
            config.credentials_path = Some(PathBuf::from(path));
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_expiry_buffer_secs(mut self, secs: i64) -> Self {
        self.expiry_buffer_secs = secs;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_proactive_refresh_lead(mut self, lead: Duration) -> Self {
        self.proactive_refresh_lead = lead;
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    pub fn stream_url(&self) -> String {
        format!("{}/notifications/stream", self.api_base_url)
    }

    pub fn renewal_url(&self) -> String {
        format!("{}/auth/refresh", self.api_base_url)
    }

    pub fn test_trigger_url(&self, user_id: &str) -> String {
        format!(
            "{}/notifications/test/{}",
            self.api_base_url,
            urlencoding::encode(user_id)
        )
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            stream_url: self.stream_url(),
            expiry_buffer_secs: self.expiry_buffer_secs,
            heartbeat_timeout: self.heartbeat_timeout,
            settle_delay: self.settle_delay,
            backoff: self.backoff.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NotifyConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:3000/v0");
        assert_eq!(config.transport, TransportKind::ChunkedStream);
        assert_eq!(config.backoff.max_attempts, 5);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(45));
        assert_eq!(config.expiry_buffer_secs, 5);
        assert!(config.credentials_path.is_none());
    }

    #[test]
    fn test_endpoint_urls() {
        let config = NotifyConfig::default().with_api_base_url("https://api.example.com/v0/");
        assert_eq!(
            config.stream_url(),
            "https://api.example.com/v0/notifications/stream"
        );
        assert_eq!(config.renewal_url(), "https://api.example.com/v0/auth/refresh");
        assert_eq!(
            config.test_trigger_url("user 1"),
            "https://api.example.com/v0/notifications/test/user%201"
        );
    }

    #[test]
    fn test_transport_setting() {
        assert_eq!(
            TransportKind::from_setting("EventSource"),
            TransportKind::EventSource
        );
        assert_eq!(
            TransportKind::from_setting("fetch"),
            TransportKind::ChunkedStream
        );
        assert_eq!(TransportKind::from_setting(""), TransportKind::ChunkedStream);
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = NotifyConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://api.example.com/v0"),
            (SSE_METHOD_ENV, "eventsource"),
            (HEARTBEAT_TIMEOUT_ENV, "90"),
            (CREDENTIALS_ENV, "/tmp/creds.json"),
        ]));
        assert_eq!(config.api_base_url, "https://api.example.com/v0");
        assert_eq!(config.transport, TransportKind::EventSource);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(90));
        assert_eq!(
            config.credentials_path,
            Some(PathBuf::from("/tmp/creds.json"))
        );
    }

    #[test]
    fn test_from_lookup_ignores_bad_values() {
        let config = NotifyConfig::from_lookup(lookup(&[
            (API_URL_ENV, "  "),
            (HEARTBEAT_TIMEOUT_ENV, "soon"),
        ]));
        assert_eq!(config.api_base_url, "http://localhost:3000/v0");
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(45));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(API_URL_ENV, "http://env.test/v0");
        std::env::set_var(SSE_METHOD_ENV, "eventsource");
        let config = NotifyConfig::from_env();
        std::env::remove_var(API_URL_ENV);
        std::env::remove_var(SSE_METHOD_ENV);

        assert_eq!(config.api_base_url, "http://env.test/v0");
        assert_eq!(config.transport, TransportKind::EventSource);
        assert_eq!(config.stream_settings().stream_url, "http://env.test/v0/notifications/stream");
    }
}
