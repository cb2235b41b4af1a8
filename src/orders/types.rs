//! Core types for order management.
//!
//! Provides type-safe order identifiers, the broker's order vocabulary and the
//! order snapshot carried by REST responses and trade updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::types::OrderSide;

/// Type-safe order identifier (broker-assigned).
///
/// Uses a newtype wrapper to prevent accidentally mixing order IDs
/// with other string types at compile time.
///
/// # Example
///
/// ```
/// use orderstream::orders::OrderId;
///
/// let id = OrderId::new("61e69015-8549-4bfd-b9c3-01e75843f47d");
/// assert_eq!(id.as_str(), "61e69015-8549-4bfd-b9c3-01e75843f47d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Create a new OrderId from any string-like type.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner String.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Check if the order ID is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Order status as reported by the broker.
///
/// Terminal states are clearly distinguished: an order in one of them never
/// receives further events and is dropped from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    DoneForDay,
    Canceled,
    Expired,
    Replaced,
    PendingCancel,
    PendingReplace,
    PendingNew,
    Accepted,
    AcceptedForBidding,
    Stopped,
    Rejected,
    Suspended,
    Calculated,
    Held,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Returns true if no further updates are expected for the order.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Expired | Self::Rejected | Self::Suspended
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::DoneForDay => "done_for_day",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Replaced => "replaced",
            Self::PendingCancel => "pending_cancel",
            Self::PendingReplace => "pending_replace",
            Self::PendingNew => "pending_new",
            Self::Accepted => "accepted",
            Self::AcceptedForBidding => "accepted_for_bidding",
            Self::Stopped => "stopped",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
            Self::Calculated => "calculated",
            Self::Held => "held",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order execution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    TrailingStop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
            Self::TrailingStop => "trailing_stop",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market" | "mkt" => Ok(Self::Market),
            "limit" | "lmt" => Ok(Self::Limit),
            "stop" | "stp" => Ok(Self::Stop),
            "stop_limit" | "stp_lmt" | "stop limit" | "stp lmt" => Ok(Self::StopLimit),
            "trailing_stop" | "trailing stop" => Ok(Self::TrailingStop),
            _ => Err(format!(
                "Unknown order type: '{}'. Use market, limit, stop, stop_limit or trailing_stop",
                s
            )),
        }
    }
}

/// How long an order stays working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Valid for the trading day it was placed on
    Day,
    /// Good until canceled
    Gtc,
    /// Executes in the opening auction or is canceled
    Opg,
    /// Executes in the closing auction or is canceled
    Cls,
    /// Immediate or cancel, partial fills allowed
    Ioc,
    /// Fill or kill, all or nothing
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Gtc => "gtc",
            Self::Opg => "opg",
            Self::Cls => "cls",
            Self::Ioc => "ioc",
            Self::Fok => "fok",
        }
    }
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "gtc" => Ok(Self::Gtc),
            "opg" => Ok(Self::Opg),
            "cls" => Ok(Self::Cls),
            "ioc" => Ok(Self::Ioc),
            "fok" => Ok(Self::Fok),
            _ => Err(format!(
                "Unknown time in force: '{}'. Use day, gtc, opg, cls, ioc or fok",
                s
            )),
        }
    }
}

/// Order class. Composite classes link several legs together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderClass {
    Simple,
    Bracket,
    /// One cancels other
    Oco,
    /// One triggers other
    Oto,
}

impl OrderClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Bracket => "bracket",
            Self::Oco => "oco",
            Self::Oto => "oto",
        }
    }
}

impl std::fmt::Display for OrderClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The broker reports simple orders with an empty class.
        match s.trim().to_lowercase().as_str() {
            "" | "simple" => Ok(Self::Simple),
            "bracket" => Ok(Self::Bracket),
            "oco" => Ok(Self::Oco),
            "oto" => Ok(Self::Oto),
            _ => Err(format!(
                "Unknown order class: '{}'. Use simple, bracket, oco or oto",
                s
            )),
        }
    }
}

/// Asset class an order trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    UsEquity,
    UsOption,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsEquity => "us_equity",
            Self::UsOption => "us_option",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equity" | "stock" | "us_equity" => Ok(Self::UsEquity),
            "option" | "options" | "us_option" => Ok(Self::UsOption),
            _ => Err(format!(
                "Unknown asset class: '{}'. Use equity or option",
                s
            )),
        }
    }
}

/// Whether an order opens or closes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionIntent {
    BuyToOpen,
    BuyToClose,
    SellToOpen,
    SellToClose,
}

impl PositionIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyToOpen => "buy_to_open",
            Self::BuyToClose => "buy_to_close",
            Self::SellToOpen => "sell_to_open",
            Self::SellToClose => "sell_to_close",
        }
    }

    /// The order side the intent implies.
    pub fn side(&self) -> OrderSide {
        match self {
            Self::BuyToOpen | Self::BuyToClose => OrderSide::Buy,
            Self::SellToOpen | Self::SellToClose => OrderSide::Sell,
        }
    }

    pub fn is_opening(&self) -> bool {
        matches!(self, Self::BuyToOpen | Self::SellToOpen)
    }
}

impl std::fmt::Display for PositionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "buy_to_open" => Ok(Self::BuyToOpen),
            "buy_to_close" => Ok(Self::BuyToClose),
            "sell_to_open" => Ok(Self::SellToOpen),
            "sell_to_close" => Ok(Self::SellToClose),
            _ => Err(format!(
                "Unknown position intent: '{}'. Use buy_to_open, buy_to_close, sell_to_open or sell_to_close",
                s
            )),
        }
    }
}

/// Order size: a share quantity or a dollar notional, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    Quantity(Decimal),
    Notional(Decimal),
}

impl Amount {
    pub fn value(&self) -> Decimal {
        match self {
            Self::Quantity(v) | Self::Notional(v) => *v,
        }
    }

    pub fn is_notional(&self) -> bool {
        matches!(self, Self::Notional(_))
    }
}

/// Lifecycle timestamps, all normalized to UTC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTimestamps {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub replaced_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a single order.
///
/// Only `id` and `symbol` are guaranteed; trade updates routinely carry
/// partial snapshots, so every other attribute is optional. Deserialization
/// accepts the broker's JSON shape (decimals as strings or numbers). A
/// vocabulary value this crate does not know (a new order class or time in
/// force) leaves that attribute empty instead of rejecting the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOrder")]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub asset_class: Option<AssetClass>,
    pub side: Option<OrderSide>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub order_class: Option<OrderClass>,
    pub time_in_force: Option<TimeInForce>,
    pub amount: Option<Amount>,
    pub filled_qty: Option<Decimal>,
    pub filled_avg_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trail_price: Option<Decimal>,
    pub trail_percent: Option<Decimal>,
    pub extended_hours: bool,
    pub timestamps: OrderTimestamps,
    /// Id of the order this one replaced (weak link).
    pub replaces: Option<OrderId>,
    /// Id of the order that replaced this one (weak link).
    pub replaced_by: Option<OrderId>,
}

impl Order {
    /// Minimal snapshot carrying only identity.
    pub fn new(id: impl Into<OrderId>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_order_id: None,
            symbol: symbol.into(),
            asset_class: None,
            side: None,
            order_type: None,
            status: None,
            order_class: None,
            time_in_force: None,
            amount: None,
            filled_qty: None,
            filled_avg_price: None,
            limit_price: None,
            stop_price: None,
            trail_price: None,
            trail_percent: None,
            extended_hours: false,
            timestamps: OrderTimestamps::default(),
            replaces: None,
            replaced_by: None,
        }
    }

    /// Decode a snapshot from a JSON value in the broker's shape.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, OrderDecodeError> {
        Order::deserialize(value).map_err(|e| OrderDecodeError(e.to_string()))
    }

    /// Returns true if the reported status is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }

    /// Requested share quantity, if the order is sized in shares.
    pub fn quantity(&self) -> Option<Decimal> {
        match self.amount {
            Some(Amount::Quantity(q)) => Some(q),
            _ => None,
        }
    }
}

/// A snapshot that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid order snapshot: {0}")]
pub struct OrderDecodeError(pub String);

/// Wire shape of an order before validation.
#[derive(Debug, Deserialize)]
struct RawOrder {
    id: String,
    symbol: String,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default)]
    asset_class: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default, rename = "type")]
    type_: Option<String>,
    #[serde(default)]
    order_type: Option<String>,
    #[serde(default)]
    status: Option<OrderStatus>,
    #[serde(default)]
    order_class: Option<String>,
    #[serde(default)]
    time_in_force: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    qty: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    notional: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    filled_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    filled_avg_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    limit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    stop_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    trail_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    trail_percent: Option<Decimal>,
    #[serde(default)]
    extended_hours: Option<bool>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    filled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    canceled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    replaced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    replaces: Option<String>,
    #[serde(default)]
    replaced_by: Option<String>,
}

impl TryFrom<RawOrder> for Order {
    type Error = String;

    fn try_from(raw: RawOrder) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err("order id is empty".to_string());
        }
        if raw.symbol.trim().is_empty() {
            return Err(format!("order {} has an empty symbol", raw.id));
        }

        let amount = match (raw.qty, raw.notional) {
            (Some(q), Some(n)) => {
                warn!(
                    order_id = %raw.id,
                    qty = %q,
                    notional = %n,
                    "Order carries both qty and notional, keeping qty"
                );
                Some(Amount::Quantity(q))
            }
            (Some(q), None) => Some(Amount::Quantity(q)),
            (None, Some(n)) => Some(Amount::Notional(n)),
            (None, None) => None,
        };

        let id = raw.id.as_str();
        let order_type = parse_known(id, "type", raw.type_.or(raw.order_type));
        let side = parse_known(id, "side", raw.side);
        let asset_class = parse_known(id, "asset_class", raw.asset_class);
        let order_class = parse_known(id, "order_class", raw.order_class);
        let time_in_force = parse_known(id, "time_in_force", raw.time_in_force);

        Ok(Order {
            id: OrderId::new(raw.id),
            client_order_id: raw.client_order_id,
            symbol: raw.symbol,
            asset_class,
            side,
            order_type,
            status: raw.status,
            order_class,
            time_in_force,
            amount,
            filled_qty: raw.filled_qty,
            filled_avg_price: raw.filled_avg_price,
            limit_price: raw.limit_price,
            stop_price: raw.stop_price,
            trail_price: raw.trail_price,
            trail_percent: raw.trail_percent,
            extended_hours: raw.extended_hours.unwrap_or(false),
            timestamps: OrderTimestamps {
                created_at: raw.created_at,
                updated_at: raw.updated_at,
                submitted_at: raw.submitted_at,
                filled_at: raw.filled_at,
                canceled_at: raw.canceled_at,
                expired_at: raw.expired_at,
                failed_at: raw.failed_at,
                replaced_at: raw.replaced_at,
            },
            replaces: raw.replaces.filter(|r| !r.is_empty()).map(OrderId::new),
            replaced_by: raw.replaced_by.filter(|r| !r.is_empty()).map(OrderId::new),
        })
    }
}

/// Parse an optional vocabulary field, dropping values this crate does not know.
fn parse_known<T>(order_id: &str, field: &'static str, value: Option<String>) -> Option<T>
where
    T: FromStr<Err = String>,
{
    let value = value?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) if value.trim().is_empty() => None,
        Err(e) => {
            warn!(
                order_id = %order_id,
                field,
                value = %value,
                error = %e,
                "Ignoring unrecognised order field"
            );
            None
        }
    }
}

/// Accepts a decimal encoded as a JSON string, a JSON number or null.
pub(crate) fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid decimal '{}': {}", s, e))),
        Some(serde_json::Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid decimal '{}': {}", text, e)))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected decimal, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_order_id_newtype() {
        let id = OrderId::new("abc-123");
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(id.to_string(), "abc-123");

        let id2: OrderId = "xyz-789".into();
        assert_eq!(id2.as_str(), "xyz-789");

        let id3: OrderId = String::from("foo-bar").into();
        assert_eq!(id3.into_inner(), "foo-bar");
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Suspended.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(!OrderStatus::Replaced.is_terminal());
        assert!(!OrderStatus::PendingCancel.is_terminal());
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: OrderStatus = serde_json::from_value(json!("brand_new_state")).unwrap();
        assert_eq!(status, OrderStatus::Unknown);
    }

    #[test]
    fn test_order_type_aliases() {
        assert_eq!("mkt".parse::<OrderType>().unwrap(), OrderType::Market);
        assert_eq!("LMT".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert_eq!("stp".parse::<OrderType>().unwrap(), OrderType::Stop);
        assert_eq!("stop limit".parse::<OrderType>().unwrap(), OrderType::StopLimit);
        assert_eq!("stp_lmt".parse::<OrderType>().unwrap(), OrderType::StopLimit);
        assert_eq!(
            "trailing stop".parse::<OrderType>().unwrap(),
            OrderType::TrailingStop
        );
        assert!("iceberg".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_time_in_force_and_class_tables() {
        assert_eq!("GTC".parse::<TimeInForce>().unwrap(), TimeInForce::Gtc);
        assert_eq!("fok".parse::<TimeInForce>().unwrap(), TimeInForce::Fok);
        assert!("week".parse::<TimeInForce>().is_err());

        assert_eq!("".parse::<OrderClass>().unwrap(), OrderClass::Simple);
        assert_eq!("bracket".parse::<OrderClass>().unwrap(), OrderClass::Bracket);
        assert!("ladder".parse::<OrderClass>().is_err());
    }

    #[test]
    fn test_asset_class_and_position_intent_tables() {
        assert_eq!("stock".parse::<AssetClass>().unwrap(), AssetClass::UsEquity);
        assert_eq!("Options".parse::<AssetClass>().unwrap(), AssetClass::UsOption);
        assert!("bond".parse::<AssetClass>().is_err());

        let intent = "SELL_TO_CLOSE".parse::<PositionIntent>().unwrap();
        assert_eq!(intent, PositionIntent::SellToClose);
        assert_eq!(intent.side(), OrderSide::Sell);
        assert!(!intent.is_opening());
        assert_eq!(
            "buy to open".parse::<PositionIntent>().unwrap(),
            PositionIntent::BuyToOpen
        );
        assert!("buy_to_hold".parse::<PositionIntent>().is_err());
    }

    #[test]
    fn test_decode_full_broker_snapshot() {
        let value = json!({
            "id": "61e69015-8549-4bfd-b9c3-01e75843f47d",
            "client_order_id": "eb9e2aaa-f71a-4f51-b5b4-52a6c565dad4",
            "created_at": "2021-03-16T18:38:01.942282Z",
            "updated_at": "2021-03-16T18:38:01.942282Z",
            "submitted_at": "2021-03-16T18:38:01.937734Z",
            "filled_at": null,
            "symbol": "AAPL",
            "asset_class": "us_equity",
            "qty": "15",
            "notional": null,
            "filled_qty": "0",
            "filled_avg_price": null,
            "order_class": "",
            "order_type": "limit",
            "type": "limit",
            "side": "buy",
            "time_in_force": "day",
            "limit_price": "107.00",
            "stop_price": null,
            "status": "accepted",
            "extended_hours": false,
            "replaced_by": null,
            "replaces": null,
            "legs": null,
            "hwm": null
        });

        let order = Order::from_value(&value).unwrap();
        assert_eq!(order.symbol, "AAPL");
        assert_eq!(order.asset_class, Some(AssetClass::UsEquity));
        assert_eq!(order.amount, Some(Amount::Quantity(dec!(15))));
        assert_eq!(order.quantity(), Some(dec!(15)));
        assert_eq!(order.limit_price, Some(dec!(107.00)));
        assert_eq!(order.order_type, Some(OrderType::Limit));
        assert_eq!(order.order_class, Some(OrderClass::Simple));
        assert_eq!(order.side, Some(OrderSide::Buy));
        assert_eq!(order.status, Some(OrderStatus::Accepted));
        assert!(order.timestamps.created_at.is_some());
        assert!(order.timestamps.filled_at.is_none());
        assert!(!order.is_terminal());
    }

    #[test]
    fn test_decode_minimal_snapshot_with_numeric_qty() {
        let order = Order::from_value(&json!({"id": "o1", "symbol": "MSFT", "qty": 10})).unwrap();
        assert_eq!(order.id, OrderId::new("o1"));
        assert_eq!(order.quantity(), Some(dec!(10)));
        assert_eq!(order.side, None);
        assert_eq!(order.status, None);
    }

    #[test]
    fn test_decode_rejects_missing_identity() {
        assert!(Order::from_value(&json!({"symbol": "MSFT"})).is_err());
        assert!(Order::from_value(&json!({"id": "o1"})).is_err());
        assert!(Order::from_value(&json!({"id": "", "symbol": "MSFT"})).is_err());
    }

    #[test]
    fn test_decode_prefers_qty_over_notional() {
        let order = Order::from_value(&json!({
            "id": "o1", "symbol": "MSFT", "qty": "1", "notional": "100"
        }))
        .unwrap();
        assert_eq!(order.amount, Some(Amount::Quantity(dec!(1))));
    }

    #[test]
    fn test_decode_tolerates_unknown_vocabulary() {
        let order = Order::from_value(&json!({
            "id": "o1",
            "symbol": "SPY",
            "order_class": "mleg",
            "time_in_force": "gtd",
            "side": "sell_short",
            "type": "iceberg",
            "qty": "3",
            "status": "filled"
        }))
        .unwrap();
        assert_eq!(order.id, OrderId::new("o1"));
        assert_eq!(order.order_class, None);
        assert_eq!(order.time_in_force, None);
        assert_eq!(order.side, None);
        assert_eq!(order.order_type, None);
        assert_eq!(order.quantity(), Some(dec!(3)));
        assert!(order.is_terminal());
    }

    #[test]
    fn test_decode_rejects_garbage_decimal() {
        assert!(Order::from_value(&json!({"id": "o1", "symbol": "MSFT", "qty": "ten"})).is_err());
        assert!(Order::from_value(&json!({"id": "o1", "symbol": "MSFT", "qty": [1]})).is_err());
    }

    #[test]
    fn test_replacement_links_are_ids() {
        let order = Order::from_value(&json!({
            "id": "new-1", "symbol": "MSFT", "replaces": "old-1", "replaced_by": null
        }))
        .unwrap();
        assert_eq!(order.replaces, Some(OrderId::new("old-1")));
        assert_eq!(order.replaced_by, None);
    }
}
