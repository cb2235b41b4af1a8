//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for orderstream: the long-running
//! `stream` command and one-shot order entry commands.

mod config;

pub use config::{CliConfigError, ReplaceCliConfig, StreamCliConfig, SubmitCliConfig};

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::orders::{AssetClass, OrderClass, OrderType, PositionIntent, TimeInForce};
use crate::types::OrderSide;

/// orderstream - Alpaca trade-update stream and order ledger
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Set the verbosity level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub verbose: String,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Stream trade updates and keep the order ledger in sync until Ctrl-C
    Stream {
        /// Use the paper trading environment
        #[arg(long, default_value_t = false)]
        paper: bool,
        /// Override the stream endpoint
        #[arg(long)]
        url: Option<String>,
        /// Seconds without a frame before an idle tick
        #[arg(long, default_value_t = 5)]
        recv_timeout_secs: u64,
        /// Port for the /health and /metrics server
        #[arg(long)]
        health_port: Option<u16>,
    },

    /// Submit a new order
    Submit {
        /// Symbol to trade (e.g., "AAPL")
        #[arg(long)]
        symbol: String,
        /// buy or sell
        #[arg(long)]
        side: OrderSide,
        /// equity or option
        #[arg(long, default_value = "equity")]
        asset_class: AssetClass,
        /// buy_to_open, buy_to_close, sell_to_open or sell_to_close
        #[arg(long)]
        position_intent: Option<PositionIntent>,
        /// Share quantity
        #[arg(long, conflicts_with = "notional", required_unless_present = "notional")]
        qty: Option<Decimal>,
        /// Dollar amount (day market orders only)
        #[arg(long)]
        notional: Option<Decimal>,
        /// market, limit, stop, stop_limit or trailing_stop
        #[arg(long = "type", default_value = "market")]
        order_type: OrderType,
        /// day, gtc, opg, cls, ioc or fok
        #[arg(long, default_value = "day")]
        tif: TimeInForce,
        #[arg(long)]
        limit_price: Option<Decimal>,
        #[arg(long)]
        stop_price: Option<Decimal>,
        #[arg(long)]
        trail_price: Option<Decimal>,
        #[arg(long)]
        trail_percent: Option<Decimal>,
        /// simple or bracket
        #[arg(long, default_value = "simple")]
        class: OrderClass,
        /// Take-profit limit price (bracket)
        #[arg(long)]
        take_profit: Option<Decimal>,
        /// Stop-loss stop price (bracket)
        #[arg(long)]
        stop_loss_stop: Option<Decimal>,
        /// Stop-loss limit price (bracket, makes the leg stop-limit)
        #[arg(long, requires = "stop_loss_stop")]
        stop_loss_limit: Option<Decimal>,
        /// Allow execution outside regular hours
        #[arg(long, default_value_t = false)]
        extended_hours: bool,
        #[arg(long, default_value_t = false)]
        paper: bool,
    },

    /// Show whether the market is open and the next session times (UTC)
    Clock {
        #[arg(long, default_value_t = false)]
        paper: bool,
    },

    /// Cancel an open order
    Cancel {
        /// Broker order id
        #[arg(long)]
        id: String,
        #[arg(long, default_value_t = false)]
        paper: bool,
    },

    /// Replace an open order
    Replace {
        /// Broker order id
        #[arg(long)]
        id: String,
        #[arg(long)]
        qty: Option<Decimal>,
        #[arg(long)]
        tif: Option<TimeInForce>,
        #[arg(long)]
        limit_price: Option<Decimal>,
        #[arg(long)]
        stop_price: Option<Decimal>,
        /// New trail price or percent (trailing stop orders)
        #[arg(long)]
        trail: Option<Decimal>,
        #[arg(long, default_value_t = false)]
        paper: bool,
    },
}
