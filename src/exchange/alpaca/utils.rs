//! Conversions between crate types and `apca` request types.

use apca::api::v2::clock as alpaca_clock;
use apca::api::v2::order as alpaca_order;
use num_decimal::Num;
use rust_decimal::Decimal;
use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, error};

use crate::exchange::{ExchangeError, MarketClock};
use crate::orders::{
    Amount, AssetClass, NewOrderRequest, Order, OrderClass, OrderType, ReplaceOrderRequest,
    StopLoss, TimeInForce,
};
use crate::portfolio::Position;
use crate::types::OrderSide;

/// Convert internal symbol format to Alpaca format (zero-alloc when possible)
///
/// - `"AAPL"` -> `Cow::Borrowed("AAPL")`
/// - `"BTC-USD"` -> `Cow::Owned("BTCUSD")`
#[inline]
pub fn to_alpaca_symbol(symbol: &str) -> Cow<'_, str> {
    if !symbol.contains('-') {
        return Cow::Borrowed(symbol);
    }
    Cow::Owned(symbol.replace('-', ""))
}

/// Convert Decimal to num_decimal::Num with error handling.
pub fn decimal_to_num(d: Decimal) -> Result<Num, ExchangeError> {
    d.to_string().parse::<Num>().map_err(|e| {
        error!(decimal = %d, error = %e, "Failed to convert Decimal to Num");
        ExchangeError::Other(format!(
            "Decimal to Num conversion failed for '{}': {}",
            d, e
        ))
    })
}

fn optional_num(d: Option<Decimal>) -> Result<Option<Num>, ExchangeError> {
    d.map(decimal_to_num).transpose()
}

pub fn to_alpaca_side(side: OrderSide) -> alpaca_order::Side {
    match side {
        OrderSide::Buy => alpaca_order::Side::Buy,
        OrderSide::Sell => alpaca_order::Side::Sell,
    }
}

pub fn to_alpaca_type(order_type: OrderType) -> alpaca_order::Type {
    match order_type {
        OrderType::Market => alpaca_order::Type::Market,
        OrderType::Limit => alpaca_order::Type::Limit,
        OrderType::Stop => alpaca_order::Type::Stop,
        OrderType::StopLimit => alpaca_order::Type::StopLimit,
        OrderType::TrailingStop => alpaca_order::Type::TrailingStop,
    }
}

pub fn to_alpaca_time_in_force(tif: TimeInForce) -> alpaca_order::TimeInForce {
    match tif {
        TimeInForce::Day => alpaca_order::TimeInForce::Day,
        TimeInForce::Gtc => alpaca_order::TimeInForce::UntilCanceled,
        TimeInForce::Opg => alpaca_order::TimeInForce::UntilMarketOpen,
        TimeInForce::Cls => alpaca_order::TimeInForce::UntilMarketClose,
        TimeInForce::Ioc => alpaca_order::TimeInForce::ImmediateOrCancel,
        TimeInForce::Fok => alpaca_order::TimeInForce::FillOrKill,
    }
}

pub fn to_alpaca_class(class: OrderClass) -> alpaca_order::Class {
    match class {
        OrderClass::Simple => alpaca_order::Class::Simple,
        OrderClass::Bracket => alpaca_order::Class::Bracket,
        OrderClass::Oco => alpaca_order::Class::OneCancelsOther,
        OrderClass::Oto => alpaca_order::Class::OneTriggersOther,
    }
}

fn to_alpaca_stop_loss(stop_loss: StopLoss) -> Result<alpaca_order::StopLoss, ExchangeError> {
    let stop = decimal_to_num(stop_loss.stop_price)?;
    Ok(match stop_loss.limit_price {
        Some(limit) => alpaca_order::StopLoss::StopLimit(stop, decimal_to_num(limit)?),
        None => alpaca_order::StopLoss::Stop(stop),
    })
}

/// Build the `apca` create request for a validated order.
///
/// The REST client only carries US equity orders. For equities the position
/// intent is implied by the side, so it is not transmitted.
pub fn to_create_request(
    request: &NewOrderRequest,
) -> Result<alpaca_order::CreateReq, ExchangeError> {
    if request.asset_class != AssetClass::UsEquity {
        return Err(ExchangeError::Rejected(format!(
            "{} orders are not supported by the Alpaca REST client",
            request.asset_class
        )));
    }
    if let Some(intent) = request.position_intent {
        debug!(symbol = %request.symbol, intent = %intent, "Position intent carried by order side");
    }

    let amount = match request.amount {
        Amount::Quantity(q) => alpaca_order::Amount::quantity(decimal_to_num(q)?),
        Amount::Notional(n) => alpaca_order::Amount::notional(decimal_to_num(n)?),
    };

    let take_profit = request
        .take_profit
        .map(|tp| decimal_to_num(tp.limit_price).map(alpaca_order::TakeProfit::Limit))
        .transpose()?;
    let stop_loss = request.stop_loss.map(to_alpaca_stop_loss).transpose()?;

    Ok(alpaca_order::CreateReqInit {
        class: to_alpaca_class(request.class),
        type_: to_alpaca_type(request.order_type),
        time_in_force: to_alpaca_time_in_force(request.time_in_force),
        limit_price: optional_num(request.limit_price)?,
        stop_price: optional_num(request.stop_price)?,
        trail_price: optional_num(request.trail_price)?,
        trail_percent: optional_num(request.trail_percent)?,
        take_profit,
        stop_loss,
        extended_hours: request.extended_hours,
        client_order_id: request.client_order_id.clone(),
        ..Default::default()
    }
    .init(
        to_alpaca_symbol(&request.symbol),
        to_alpaca_side(request.side),
        amount,
    ))
}

/// Build the `apca` change request for a replace.
pub fn to_change_request(
    request: &ReplaceOrderRequest,
) -> Result<alpaca_order::ChangeReq, ExchangeError> {
    Ok(alpaca_order::ChangeReq {
        quantity: optional_num(request.quantity)?,
        time_in_force: request.time_in_force.map(to_alpaca_time_in_force),
        limit_price: optional_num(request.limit_price)?,
        stop_price: optional_num(request.stop_price)?,
        trail: optional_num(request.trail)?,
        ..Default::default()
    })
}

/// Decode a broker order through the same snapshot decoder the stream uses.
pub fn order_from_alpaca<T: Serialize>(order: &T) -> Result<Order, ExchangeError> {
    let value = serde_json::to_value(order)
        .map_err(|e| ExchangeError::Other(format!("Failed to encode broker order: {}", e)))?;
    Order::from_value(&value).map_err(|e| ExchangeError::Other(e.to_string()))
}

pub fn clock_from_alpaca(clock: &alpaca_clock::Clock) -> MarketClock {
    MarketClock {
        is_open: clock.open,
        timestamp: clock.current,
        next_open: clock.next_open,
        next_close: clock.next_close,
    }
}

pub fn position_from_alpaca<T: Serialize>(position: &T) -> Result<Position, ExchangeError> {
    let value = serde_json::to_value(position)
        .map_err(|e| ExchangeError::Other(format!("Failed to encode broker position: {}", e)))?;
    Position::from_value(&value)
}
