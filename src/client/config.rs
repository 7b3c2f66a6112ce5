//! Client configuration

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    layer::retry::RetryPolicy,
    protocol::{error::A2AResult, time},
};

/// Configuration for an A2A client
///
/// Durations are float seconds when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the agent service; the stream channel uses the same host
    pub base_url: Url,

    /// Sent as `X-API-Key` on both channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateConfig>,

    /// Default deadline for one exchange
    #[serde(default = "default_timeout", with = "time::secs")]
    pub timeout: Duration,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Attempt the stream channel on connect
    #[serde(default = "default_true")]
    pub websocket_enabled: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            certificate: None,
            timeout: default_timeout(),
            retry_policy: RetryPolicy::default(),
            websocket_enabled: true,
            logging: LoggingConfig::default(),
            user_agent: default_user_agent(),
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> A2AResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_certificate(mut self, certificate: CertificateConfig) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Enable or disable the stream channel
    pub fn with_websocket(mut self, enabled: bool) -> Self {
        self.websocket_enabled = enabled;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Client certificate for mutual TLS
///
/// Both files are PEM. With a `passphrase`, `key_file` is an encrypted
/// PKCS#8 key (`ENCRYPTED PRIVATE KEY`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl CertificateConfig {
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            ca_file: None,
            passphrase: None,
        }
    }

    pub fn with_ca_file(mut self, ca_file: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(ca_file.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Log serialized outgoing messages at debug level
    pub enable_request_logging: bool,
    /// Log raw responses at debug level
    pub enable_response_logging: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::retry::BackoffStrategy;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("http://localhost:8080".parse().unwrap());

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.websocket_enabled);
        assert_eq!(config.retry_policy.max_retries, 3);
        assert!(config.user_agent.starts_with("tower-a2a-swarm/"));
    }

    #[test]
    fn test_from_json() {
        let config = ClientConfig::from_json_str(
            r#"{
                "base_url": "https://swarm.example.com",
                "api_key": "secret",
                "timeout": 12.5,
                "websocket_enabled": false,
                "retry_policy": {"max_retries": 1, "backoff_strategy": "linear"},
                "certificate": {"cert_file": "client.pem", "key_file": "client.key"},
                "logging": {"level": "warning", "enable_request_logging": true}
            }"#,
        )
        .unwrap();

        assert_eq!(config.base_url.host_str(), Some("swarm.example.com"));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_millis(12_500));
        assert!(!config.websocket_enabled);
        assert_eq!(config.retry_policy.backoff_strategy, BackoffStrategy::Linear);
        assert_eq!(
            config.certificate,
            Some(CertificateConfig::new("client.pem", "client.key"))
        );
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.logging.enable_request_logging);
        assert!(!config.logging.enable_response_logging);
    }

    #[test]
    fn test_base_url_is_required() {
        assert!(ClientConfig::from_json_str(r#"{"timeout": 5}"#).is_err());
    }
}
