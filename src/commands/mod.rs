//! CLI command handlers.
//!
//! This module contains the implementation for each CLI subcommand,
//! wiring the broker client, ledger and stream together.

mod cancel;
mod clock;
mod replace;
mod stream;
mod submit;

pub use cancel::run_cancel;
pub use clock::run_clock;
pub use replace::run_replace;
pub use stream::run_stream;
pub use submit::run_submit;

use std::sync::Arc;

use crate::exchange::alpaca::AlpacaClient;
use crate::exchange::{AppEnv, ExchangeConfig};
use crate::orders::{OrderDesk, OrderLedger};

/// Order desk over a fresh REST client and an empty ledger.
fn build_desk(env: AppEnv) -> Result<OrderDesk, Box<dyn std::error::Error>> {
    let config = ExchangeConfig::from_env(env)?;
    let client = AlpacaClient::from_config(&config)?;
    Ok(OrderDesk::new(Arc::new(client), OrderLedger::new()))
}
