//! Exchange Access Layer
//!
//! Credentials, trading environment and the broker REST adapter.

pub mod alpaca;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Trading environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppEnv {
    Live,
    Paper,
}

impl AppEnv {
    pub fn from_paper_flag(paper: bool) -> Self {
        if paper {
            AppEnv::Paper
        } else {
            AppEnv::Live
        }
    }

    pub fn is_paper(&self) -> bool {
        matches!(self, AppEnv::Paper)
    }
}

impl std::fmt::Display for AppEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEnv::Live => write!(f, "live"),
            AppEnv::Paper => write!(f, "paper"),
        }
    }
}

/// Errors raised while talking to the broker.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Broker rejected request: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Exchange error: {0}")]
    Other(String),
}

/// Market session state reported by the broker, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClock {
    pub is_open: bool,
    pub timestamp: DateTime<Utc>,
    pub next_open: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
}

impl MarketClock {
    /// Next open while closed, next close while open.
    pub fn next_session_change(&self) -> DateTime<Utc> {
        if self.is_open {
            self.next_close
        } else {
            self.next_open
        }
    }

    pub fn until_next_change(&self) -> chrono::Duration {
        self.next_session_change() - self.timestamp
    }
}

/// Credentials and environment for a broker connection.
#[derive(Clone)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub env: AppEnv,
}

impl std::fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("env", &self.env)
            .finish()
    }
}

impl ExchangeConfig {
    pub const KEY_VAR: &'static str = "ALPACA_API_KEY";
    pub const SECRET_VAR: &'static str = "ALPACA_API_SECRET";

    /// Create config from environment variables
    ///
    /// # Environment Variables
    /// - `ALPACA_API_KEY`: Your Alpaca API key
    /// - `ALPACA_API_SECRET`: Your Alpaca API secret
    pub fn from_env(env: AppEnv) -> Result<Self, ExchangeError> {
        let api_key = std::env::var(Self::KEY_VAR).map_err(|_| {
            ExchangeError::Configuration(format!("{} must be set in environment", Self::KEY_VAR))
        })?;
        let api_secret = std::env::var(Self::SECRET_VAR).map_err(|_| {
            ExchangeError::Configuration(format!(
                "{} must be set in environment",
                Self::SECRET_VAR
            ))
        })?;

        Ok(Self {
            api_key,
            api_secret,
            env,
        })
    }
}
