//! Trade-update stream wire protocol.
//!
//! ## Flow
//! 1. Connect to `wss://paper-api.alpaca.markets/stream` (or the live host)
//! 2. Send `{"action":"authenticate","data":{"key_id":"...","secret_key":"..."}}`
//! 3. Receive `{"stream":"authorization","data":{"status":"authorized",...}}`
//! 4. Send `{"action":"listen","data":{"streams":["trade_updates"]}}`
//! 5. Receive `{"stream":"listening","data":{"streams":["trade_updates"]}}`
//! 6. Receive `{"stream":"trade_updates","data":{"event":"fill","order":{...},...}}`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::StreamError;
use crate::orders::{lenient_decimal, Order, OrderId};

/// Stream carrying order lifecycle events.
pub const TRADE_UPDATES: &str = "trade_updates";
const AUTHORIZATION: &str = "authorization";
const LISTENING: &str = "listening";
const AUTHORIZED: &str = "authorized";

/// Credentials frame sent right after connecting.
pub fn auth_frame(key_id: &str, secret_key: &str) -> String {
    json!({
        "action": "authenticate",
        "data": {
            "key_id": key_id,
            "secret_key": secret_key
        }
    })
    .to_string()
}

/// Subscription frame for the given streams.
pub fn listen_frame(streams: &[&str]) -> String {
    json!({
        "action": "listen",
        "data": {
            "streams": streams
        }
    })
    .to_string()
}

/// Kind of order lifecycle event carried by a trade update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TradeEventKind {
    New,
    Fill,
    PartialFill,
    Canceled,
    Expired,
    Rejected,
    Suspended,
    Replaced,
    PendingNew,
    PendingCancel,
    PendingReplace,
    DoneForDay,
    Stopped,
    Calculated,
    OrderCancelRejected,
    OrderReplaceRejected,
    /// Event names this client does not know about yet.
    Other(String),
}

impl TradeEventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "new" => Self::New,
            "fill" => Self::Fill,
            "partial_fill" => Self::PartialFill,
            "canceled" => Self::Canceled,
            "expired" => Self::Expired,
            "rejected" => Self::Rejected,
            "suspended" => Self::Suspended,
            "replaced" => Self::Replaced,
            "pending_new" => Self::PendingNew,
            "pending_cancel" => Self::PendingCancel,
            "pending_replace" => Self::PendingReplace,
            "done_for_day" => Self::DoneForDay,
            "stopped" => Self::Stopped,
            "calculated" => Self::Calculated,
            "order_cancel_rejected" => Self::OrderCancelRejected,
            "order_replace_rejected" => Self::OrderReplaceRejected,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "new",
            Self::Fill => "fill",
            Self::PartialFill => "partial_fill",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
            Self::Replaced => "replaced",
            Self::PendingNew => "pending_new",
            Self::PendingCancel => "pending_cancel",
            Self::PendingReplace => "pending_replace",
            Self::DoneForDay => "done_for_day",
            Self::Stopped => "stopped",
            Self::Calculated => "calculated",
            Self::OrderCancelRejected => "order_cancel_rejected",
            Self::OrderReplaceRejected => "order_replace_rejected",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for TradeEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution details attached to fill events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Execution {
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub qty: Option<Decimal>,
    /// Position size after the execution
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub position_qty: Option<Decimal>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A decoded `trade_updates` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeUpdate {
    pub kind: TradeEventKind,
    pub order: Order,
    pub execution: Option<Execution>,
}

impl TradeUpdate {
    pub fn order_id(&self) -> &OrderId {
        &self.order.id
    }

    pub fn symbol(&self) -> &str {
        &self.order.symbol
    }
}

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub status: String,
    pub action: Option<String>,
}

impl AuthResult {
    pub fn is_authorized(&self) -> bool {
        self.status == AUTHORIZED
    }
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    AuthResult(AuthResult),
    SubscriptionAck { streams: Vec<String> },
    TradeUpdate(TradeUpdate),
    /// Any stream this client does not handle, or no stream at all.
    Other { stream: Option<String> },
}

impl StreamEvent {
    /// Declared stream name, used for routing.
    pub fn stream(&self) -> Option<&str> {
        match self {
            StreamEvent::AuthResult(_) => Some(AUTHORIZATION),
            StreamEvent::SubscriptionAck { .. } => Some(LISTENING),
            StreamEvent::TradeUpdate(_) => Some(TRADE_UPDATES),
            StreamEvent::Other { stream } => stream.as_deref(),
        }
    }
}

/// Decode one inbound text frame.
///
/// Frames that are not JSON objects, and trade updates lacking an event
/// name or an order identity, fail with [`StreamError::Malformed`].
pub fn decode_frame(text: &str) -> Result<StreamEvent, StreamError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StreamError::Malformed(format!("invalid JSON: {}", e)))?;

    let frame = value
        .as_object()
        .ok_or_else(|| StreamError::Malformed("frame is not a JSON object".to_string()))?;

    let stream = frame.get("stream").and_then(Value::as_str);
    let data = frame.get("data");

    match stream {
        Some(AUTHORIZATION) => Ok(StreamEvent::AuthResult(decode_auth(data))),
        // Some servers omit the stream name on the auth ack.
        None if data.and_then(|d| d.get("status")).is_some() => {
            Ok(StreamEvent::AuthResult(decode_auth(data)))
        }
        Some(LISTENING) => {
            let streams = data
                .and_then(|d| d.get("streams"))
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Ok(StreamEvent::SubscriptionAck { streams })
        }
        Some(TRADE_UPDATES) => {
            let data = data.ok_or_else(|| {
                StreamError::Malformed("trade update without data".to_string())
            })?;
            decode_trade_update(data).map(StreamEvent::TradeUpdate)
        }
        other => Ok(StreamEvent::Other {
            stream: other.map(str::to_string),
        }),
    }
}

fn decode_auth(data: Option<&Value>) -> AuthResult {
    let field = |name: &str| {
        data.and_then(|d| d.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    AuthResult {
        status: field("status").unwrap_or_default(),
        action: field("action"),
    }
}

fn decode_trade_update(data: &Value) -> Result<TradeUpdate, StreamError> {
    let data_obj = data
        .as_object()
        .ok_or_else(|| StreamError::Malformed("trade update data is not an object".to_string()))?;

    let kind = data_obj
        .get("event")
        .and_then(Value::as_str)
        .map(TradeEventKind::parse)
        .ok_or_else(|| StreamError::Malformed("trade update without event".to_string()))?;

    // The order snapshot normally lives under `data.order`; id and symbol
    // may be reported alongside it instead.
    let (snapshot, execution) = match data_obj.get("order") {
        Some(Value::Object(order)) => {
            let mut order = order.clone();
            for key in ["id", "symbol"] {
                if !order.contains_key(key) {
                    if let Some(v) = data_obj.get(key) {
                        order.insert(key.to_string(), v.clone());
                    }
                }
            }
            let execution = decode_execution(data)?;
            (Value::Object(order), execution)
        }
        Some(Value::Null) | None => (data.clone(), None),
        Some(_) => {
            return Err(StreamError::Malformed(
                "trade update order is not an object".to_string(),
            ))
        }
    };

    let order = Order::from_value(&snapshot)
        .map_err(|e| StreamError::Malformed(format!("{} event: {}", kind, e)))?;

    Ok(TradeUpdate {
        kind,
        order,
        execution,
    })
}

fn decode_execution(data: &Value) -> Result<Option<Execution>, StreamError> {
    let execution = Execution::deserialize(data)
        .map_err(|e| StreamError::Malformed(format!("invalid execution: {}", e)))?;
    if execution.price.is_none() && execution.qty.is_none() {
        return Ok(None);
    }
    Ok(Some(execution))
}
