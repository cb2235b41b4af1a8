//! orderstream: Alpaca trade-update stream client with a local order ledger.

pub mod cli;
pub mod commands;
pub mod exchange;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod observability;
pub mod orders;
pub mod portfolio;
pub mod stream;
pub mod types;
