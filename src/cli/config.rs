//! CLI configuration structs bridging CLI arguments to domain types.
//!
//! These structs decouple the CLI parsing layer from the business logic,
//! allowing command handlers to work with validated, typed configurations.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

use crate::exchange::{AppEnv, ExchangeConfig};
use crate::orders::{
    Amount, AssetClass, NewOrderRequest, OrderClass, OrderId, OrderType, PositionIntent,
    ReplaceOrderRequest, StopLoss, TakeProfit, TimeInForce,
};
use crate::stream::StreamConfig;
use crate::types::OrderSide;

#[derive(Debug, Error, PartialEq)]
pub enum CliConfigError {
    #[error("Specify exactly one of --qty or --notional")]
    Amount,

    #[error("--recv-timeout-secs must be positive")]
    RecvTimeout,

    #[error("Bracket legs given without --class bracket: {0}")]
    BracketLegs(&'static str),
}

/// Configuration for the `stream` command.
#[derive(Debug, Clone)]
pub struct StreamCliConfig {
    pub env: AppEnv,
    /// Endpoint override; falls back to `ALPACA_STREAM_URL`, then the env default
    pub url: Option<String>,
    pub recv_timeout_secs: u64,
    pub health_port: Option<u16>,
}

impl StreamCliConfig {
    pub fn stream_config(&self, exchange: &ExchangeConfig) -> Result<StreamConfig, CliConfigError> {
        if self.recv_timeout_secs == 0 {
            return Err(CliConfigError::RecvTimeout);
        }
        let mut config = StreamConfig::from_exchange_config(exchange)
            .with_recv_timeout(Duration::from_secs(self.recv_timeout_secs));
        if let Some(url) = &self.url {
            config = config.with_endpoint(url.clone());
        }
        Ok(config)
    }
}

/// Configuration for the `submit` command.
#[derive(Debug, Clone)]
pub struct SubmitCliConfig {
    pub symbol: String,
    pub side: OrderSide,
    pub asset_class: AssetClass,
    pub position_intent: Option<PositionIntent>,
    pub qty: Option<Decimal>,
    pub notional: Option<Decimal>,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trail_price: Option<Decimal>,
    pub trail_percent: Option<Decimal>,
    pub class: OrderClass,
    pub take_profit: Option<Decimal>,
    pub stop_loss_stop: Option<Decimal>,
    pub stop_loss_limit: Option<Decimal>,
    pub extended_hours: bool,
    pub env: AppEnv,
}

impl SubmitCliConfig {
    /// Build the order request. Order rules are checked later by
    /// [`NewOrderRequest::validate`].
    pub fn to_request(&self) -> Result<NewOrderRequest, CliConfigError> {
        let amount = match (self.qty, self.notional) {
            (Some(q), None) => Amount::Quantity(q),
            (None, Some(n)) => Amount::Notional(n),
            _ => return Err(CliConfigError::Amount),
        };

        let take_profit = self.take_profit.map(|limit_price| TakeProfit { limit_price });
        let stop_loss = self.stop_loss_stop.map(|stop_price| StopLoss {
            stop_price,
            limit_price: self.stop_loss_limit,
        });

        if self.class != OrderClass::Bracket {
            if take_profit.is_some() {
                return Err(CliConfigError::BracketLegs("--take-profit"));
            }
            if stop_loss.is_some() {
                return Err(CliConfigError::BracketLegs("--stop-loss-stop"));
            }
        }

        Ok(NewOrderRequest {
            asset_class: self.asset_class,
            position_intent: self.position_intent,
            order_type: self.order_type,
            time_in_force: self.tif,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            trail_price: self.trail_price,
            trail_percent: self.trail_percent,
            class: self.class,
            take_profit,
            stop_loss,
            extended_hours: self.extended_hours,
            ..NewOrderRequest::market(self.symbol.trim().to_uppercase(), self.side, amount)
        })
    }
}

/// Configuration for the `replace` command.
#[derive(Debug, Clone)]
pub struct ReplaceCliConfig {
    pub id: OrderId,
    pub qty: Option<Decimal>,
    pub tif: Option<TimeInForce>,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trail: Option<Decimal>,
    pub env: AppEnv,
}

impl ReplaceCliConfig {
    pub fn to_request(&self) -> ReplaceOrderRequest {
        ReplaceOrderRequest {
            quantity: self.qty,
            time_in_force: self.tif,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            trail: self.trail,
        }
    }
}
