//! Stream connection settings.

use std::time::Duration;

use thiserror::Error;

use super::backoff::ReconnectPolicy;
use crate::exchange::{AppEnv, ExchangeConfig};

/// Paper trading stream endpoint.
pub const PAPER_STREAM_URL: &str = "wss://paper-api.alpaca.markets/stream";
/// Live trading stream endpoint.
pub const LIVE_STREAM_URL: &str = "wss://api.alpaca.markets/stream";
/// Environment variable overriding the endpoint.
pub const STREAM_URL_VAR: &str = "ALPACA_STREAM_URL";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamConfigError {
    #[error("endpoint must be a ws:// or wss:// URL, got '{0}'")]
    InvalidEndpoint(String),

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("credentials are empty")]
    MissingCredentials,
}

/// Settings for a [`ConnectionManager`](super::ConnectionManager).
#[derive(Clone)]
pub struct StreamConfig {
    pub endpoint: String,
    pub key_id: String,
    pub secret_key: String,
    /// Bounded wait for each inbound frame (and for the auth ack).
    pub recv_timeout: Duration,
    pub connect_timeout: Duration,
    /// Capacity of the control mailbox.
    pub control_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("endpoint", &self.endpoint)
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .field("recv_timeout", &self.recv_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("control_capacity", &self.control_capacity)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl StreamConfig {
    pub fn new(
        endpoint: impl Into<String>,
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            recv_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            control_capacity: 32,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Endpoint for the environment, honouring `ALPACA_STREAM_URL`.
    pub fn endpoint_for(env: AppEnv) -> String {
        match std::env::var(STREAM_URL_VAR) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => match env {
                AppEnv::Paper => PAPER_STREAM_URL.to_string(),
                AppEnv::Live => LIVE_STREAM_URL.to_string(),
            },
        }
    }

    pub fn from_exchange_config(config: &ExchangeConfig) -> Self {
        Self::new(
            Self::endpoint_for(config.env),
            config.api_key.clone(),
            config.api_secret.clone(),
        )
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn validate(&self) -> Result<(), StreamConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(StreamConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.key_id.is_empty() || self.secret_key.is_empty() {
            return Err(StreamConfigError::MissingCredentials);
        }
        if self.recv_timeout.is_zero() {
            return Err(StreamConfigError::NonPositive("recv_timeout"));
        }
        if self.connect_timeout.is_zero() {
            return Err(StreamConfigError::NonPositive("connect_timeout"));
        }
        if self.control_capacity == 0 {
            return Err(StreamConfigError::NonPositive("control_capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StreamConfig {
        StreamConfig::new(PAPER_STREAM_URL, "key", "secret")
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.recv_timeout, Duration::from_secs(5));
        assert_eq!(config.control_capacity, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert_eq!(
            config().with_endpoint("https://example.com").validate(),
            Err(StreamConfigError::InvalidEndpoint("https://example.com".to_string()))
        );
        assert_eq!(
            config().with_recv_timeout(Duration::ZERO).validate(),
            Err(StreamConfigError::NonPositive("recv_timeout"))
        );
        assert_eq!(
            StreamConfig::new(PAPER_STREAM_URL, "", "secret").validate(),
            Err(StreamConfigError::MissingCredentials)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let printed = format!("{:?}", StreamConfig::new(LIVE_STREAM_URL, "key", "hunter2"));
        assert!(!printed.contains("hunter2"));
    }
}
