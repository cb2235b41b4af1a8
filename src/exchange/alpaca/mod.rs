//! Alpaca Exchange Client
//!
//! REST adapter for Alpaca Markets: order entry and position reads.
//! The trade-update stream lives in [`crate::stream`].
//!
//! ## Usage
//! ```ignore
//! use orderstream::exchange::{AppEnv, ExchangeConfig};
//! use orderstream::exchange::alpaca::AlpacaClient;
//!
//! let config = ExchangeConfig::from_env(AppEnv::Paper)?;
//! let client = AlpacaClient::from_config(&config)?;
//! ```

mod client;
pub mod utils;

pub use client::{AlpacaClient, LIVE_API_URL, PAPER_API_URL};
