//! Client configuration types.
//!
//! This module defines how a chat session reaches its backend and how it reads
//! the backend's replies.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::parser::PayloadFormat;

/// Environment variable holding the backend base URL.
pub const ENV_API_BASE: &str = "CLARITY_API_BASE";
/// Environment variable selecting [`TransportMode`].
pub const ENV_MODE: &str = "CLARITY_MODE";
/// Environment variable selecting [`PayloadFormat`].
pub const ENV_PAYLOAD_FORMAT: &str = "CLARITY_PAYLOAD_FORMAT";
/// Environment variable holding the per-chunk read timeout in seconds.
pub const ENV_READ_TIMEOUT: &str = "CLARITY_READ_TIMEOUT_SECS";

/// Greeting installed at session start and after every reset.
pub const DEFAULT_GREETING: &str = "Hi! I'm Clarity Coach. How can I help today?";

/// How replies are requested from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// `POST /chat/stream`, tokens arrive as `data:` lines.
    #[default]
    Stream,
    /// `POST /chat`, one JSON body with the whole reply.
    Single,
}

impl FromStr for TransportMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" | "streaming" => Ok(Self::Stream),
            "single" | "json" => Ok(Self::Single),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown transport mode '{other}'"
            ))),
        }
    }
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL (e.g., `http://localhost:8000`). `None` leaves the
    /// session unable to send; every send reports the missing address inline.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Streaming or single-shot replies.
    #[serde(default)]
    pub mode: TransportMode,

    /// Encoding of `data:` payloads in streamed replies.
    #[serde(default)]
    pub payload_format: PayloadFormat,

    /// Maximum wait for each response chunk, in seconds.
    #[serde(default = "ClientConfig::default_read_timeout")]
    pub read_timeout_seconds: u64,

    /// TCP connect timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// First assistant message of every fresh conversation.
    #[serde(default = "ClientConfig::default_greeting")]
    pub greeting: String,
}

impl ClientConfig {
    const fn default_read_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        10
    }

    fn default_greeting() -> String {
        DEFAULT_GREETING.to_string()
    }

    /// Create a configuration pointing at `base_url` with defaults otherwise.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Load configuration from `CLARITY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            base_url: lookup(ENV_API_BASE).filter(|url| !url.trim().is_empty()),
            ..Self::default()
        };

        if let Some(mode) = lookup(ENV_MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(format) = lookup(ENV_PAYLOAD_FORMAT) {
            config.payload_format = format.parse()?;
        }
        if let Some(secs) = lookup(ENV_READ_TIMEOUT) {
            config.read_timeout_seconds = secs.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("{ENV_READ_TIMEOUT} must be seconds, got '{secs}'"))
            })?;
        }

        Ok(config)
    }

    /// Get the per-chunk read timeout as a `Duration`.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            mode: TransportMode::default(),
            payload_format: PayloadFormat::default(),
            read_timeout_seconds: Self::default_read_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            greeting: Self::default_greeting(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, None);
        assert_eq!(config.mode, TransportMode::Stream);
        assert_eq!(config.payload_format, PayloadFormat::Raw);
        assert_eq!(config.read_timeout_seconds, 30);
        assert_eq!(config.greeting, DEFAULT_GREETING);
    }

    #[test]
    fn timeout_duration() {
        let config = ClientConfig::default();
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (ENV_API_BASE, "http://localhost:8000"),
            (ENV_MODE, "single"),
            (ENV_PAYLOAD_FORMAT, "json"),
            (ENV_READ_TIMEOUT, "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.mode, TransportMode::Single);
        assert_eq!(config.payload_format, PayloadFormat::Json);
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn blank_base_url_counts_as_absent() {
        let config = ClientConfig::from_lookup(lookup_from(&[(ENV_API_BASE, "  ")])).unwrap();
        assert_eq!(config.base_url, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_MODE, "carrier-pigeon")]))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));

        let err =
            ClientConfig::from_lookup(lookup_from(&[(ENV_READ_TIMEOUT, "soon")])).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://api","mode":"single"}"#).unwrap();
        assert_eq!(config.mode, TransportMode::Single);
        assert_eq!(config.read_timeout_seconds, 30);
        assert_eq!(config.greeting, DEFAULT_GREETING);
    }
}
