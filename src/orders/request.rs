//! Outbound order requests and their validation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::types::{
    Amount, AssetClass, OrderClass, OrderId, OrderType, PositionIntent, TimeInForce,
};
use crate::exchange::ExchangeError;
use crate::types::OrderSide;

/// Errors from order submission and management.
#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Invalid(String),

    #[error("Unsupported order: {0}")]
    Unsupported(String),

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Profit-taking leg of a bracket order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeProfit {
    pub limit_price: Decimal,
}

/// Stop-loss leg of a bracket order.
///
/// With a `limit_price` the leg becomes a stop-limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLoss {
    pub stop_price: Decimal,
    pub limit_price: Option<Decimal>,
}

/// A new order to submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub position_intent: Option<PositionIntent>,
    pub amount: Amount,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trail_price: Option<Decimal>,
    pub trail_percent: Option<Decimal>,
    pub class: OrderClass,
    pub take_profit: Option<TakeProfit>,
    pub stop_loss: Option<StopLoss>,
    pub extended_hours: bool,
    pub client_order_id: Option<String>,
}

impl NewOrderRequest {
    /// Simple day market order.
    pub fn market(symbol: impl Into<String>, side: OrderSide, amount: Amount) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::UsEquity,
            side,
            position_intent: None,
            amount,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            limit_price: None,
            stop_price: None,
            trail_price: None,
            trail_percent: None,
            class: OrderClass::Simple,
            take_profit: None,
            stop_loss: None,
            extended_hours: false,
            client_order_id: None,
        }
    }

    /// Simple day limit order for a share quantity.
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, Amount::Quantity(quantity))
        }
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Declare whether the order opens or closes a position.
    pub fn with_position_intent(mut self, intent: PositionIntent) -> Self {
        self.position_intent = Some(intent);
        self
    }

    /// Turn this order into a bracket with both exit legs.
    pub fn with_bracket(mut self, take_profit: TakeProfit, stop_loss: StopLoss) -> Self {
        self.class = OrderClass::Bracket;
        self.take_profit = Some(take_profit);
        self.stop_loss = Some(stop_loss);
        self
    }

    /// Check the request against the broker's order rules.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.symbol.trim().is_empty() {
            return Err(OrderError::Invalid("symbol must not be empty".to_string()));
        }
        if self.amount.value() <= Decimal::ZERO {
            return Err(OrderError::Invalid(format!(
                "amount must be positive, got {}",
                self.amount.value()
            )));
        }

        for (name, price) in [
            ("limit_price", self.limit_price),
            ("stop_price", self.stop_price),
            ("trail_price", self.trail_price),
            ("trail_percent", self.trail_percent),
        ] {
            if matches!(price, Some(p) if p <= Decimal::ZERO) {
                return Err(OrderError::Invalid(format!("{} must be positive", name)));
            }
        }

        match self.order_type {
            OrderType::Market => {}
            OrderType::Limit => require(self.limit_price, "limit orders require limit_price")?,
            OrderType::Stop => require(self.stop_price, "stop orders require stop_price")?,
            OrderType::StopLimit => {
                require(self.limit_price, "stop_limit orders require limit_price")?;
                require(self.stop_price, "stop_limit orders require stop_price")?;
            }
            OrderType::TrailingStop => {
                if self.trail_price.is_some() == self.trail_percent.is_some() {
                    return Err(OrderError::Invalid(
                        "trailing_stop orders require exactly one of trail_price or trail_percent"
                            .to_string(),
                    ));
                }
            }
        }

        if self.amount.is_notional()
            && (self.order_type != OrderType::Market || self.time_in_force != TimeInForce::Day)
        {
            return Err(OrderError::Invalid(
                "notional amounts are only accepted for day market orders".to_string(),
            ));
        }

        match self.class {
            OrderClass::Simple => {
                if self.take_profit.is_some() || self.stop_loss.is_some() {
                    return Err(OrderError::Invalid(
                        "take_profit and stop_loss require the bracket class".to_string(),
                    ));
                }
            }
            OrderClass::Bracket => {
                if self.take_profit.is_none() || self.stop_loss.is_none() {
                    return Err(OrderError::Invalid(
                        "bracket orders require take_profit and stop_loss".to_string(),
                    ));
                }
                if !matches!(self.order_type, OrderType::Market | OrderType::Limit) {
                    return Err(OrderError::Invalid(format!(
                        "bracket entry must be market or limit, got {}",
                        self.order_type
                    )));
                }
            }
            OrderClass::Oco | OrderClass::Oto => {
                return Err(OrderError::Unsupported(format!(
                    "{} orders are not supported",
                    self.class
                )));
            }
        }

        if let Some(intent) = self.position_intent {
            if intent.side() != self.side {
                return Err(OrderError::Invalid(format!(
                    "position intent {} does not match side {}",
                    intent, self.side
                )));
            }
        }

        if self.asset_class == AssetClass::UsOption {
            self.validate_option()?;
        }

        Ok(())
    }

    /// Option orders trade whole contracts as simple day orders in regular hours.
    fn validate_option(&self) -> Result<(), OrderError> {
        match self.amount {
            Amount::Notional(_) => {
                return Err(OrderError::Invalid(
                    "option orders must be sized in contracts".to_string(),
                ))
            }
            Amount::Quantity(q) if !q.fract().is_zero() => {
                return Err(OrderError::Invalid(format!(
                    "option orders require whole contracts, got {}",
                    q
                )))
            }
            Amount::Quantity(_) => {}
        }
        if self.class != OrderClass::Simple {
            return Err(OrderError::Invalid(
                "option orders must use the simple class".to_string(),
            ));
        }
        if self.time_in_force != TimeInForce::Day {
            return Err(OrderError::Invalid(
                "option orders must use day time in force".to_string(),
            ));
        }
        if self.extended_hours {
            return Err(OrderError::Invalid(
                "option orders cannot trade in extended hours".to_string(),
            ));
        }
        Ok(())
    }
}

fn require(value: Option<Decimal>, message: &str) -> Result<(), OrderError> {
    value
        .map(|_| ())
        .ok_or_else(|| OrderError::Invalid(message.to_string()))
}

/// Changes to an open order. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOrderRequest {
    pub quantity: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trail: Option<Decimal>,
}

impl ReplaceOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.time_in_force.is_none()
            && self.limit_price.is_none()
            && self.stop_price.is_none()
            && self.trail.is_none()
    }

    /// Drop fields that do not apply to an order of `order_type`.
    ///
    /// An unknown type keeps every field and leaves the decision to the broker.
    pub fn applicable_to(mut self, order_type: Option<OrderType>) -> Self {
        let Some(order_type) = order_type else {
            return self;
        };

        let takes_limit = matches!(order_type, OrderType::Limit | OrderType::StopLimit);
        let takes_stop = matches!(order_type, OrderType::Stop | OrderType::StopLimit);
        let takes_trail = order_type == OrderType::TrailingStop;

        if !takes_limit && self.limit_price.take().is_some() {
            warn!(order_type = %order_type, "Ignoring limit_price for order type");
        }
        if !takes_stop && self.stop_price.take().is_some() {
            warn!(order_type = %order_type, "Ignoring stop_price for order type");
        }
        if !takes_trail && self.trail.take().is_some() {
            warn!(order_type = %order_type, "Ignoring trail for order type");
        }
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.is_empty() {
            return Err(OrderError::Invalid(
                "replace request changes nothing".to_string(),
            ));
        }
        if matches!(self.quantity, Some(q) if q <= Decimal::ZERO) {
            return Err(OrderError::Invalid("quantity must be positive".to_string()));
        }
        Ok(())
    }
}
