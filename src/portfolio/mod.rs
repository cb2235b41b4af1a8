//! Portfolio Module
//!
//! Position cache kept fresh by fills on the trade-update stream.
//!
//! - `Portfolio` - Collaborator the order reconciler notifies after fills
//! - `PositionSource` - Where positions come from (the broker REST API)
//! - `PositionBook` - Concurrent position cache implementing `Portfolio`

mod book;

pub use book::PositionBook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exchange::ExchangeError;
use crate::orders::lenient_decimal;

/// Errors from portfolio refreshes. Always best-effort for callers.
#[derive(Debug, Clone, Error)]
pub enum PortfolioError {
    #[error("Failed to refresh position for {symbol}: {source}")]
    Refresh {
        symbol: String,
        #[source]
        source: ExchangeError,
    },

    #[error("Failed to load positions: {0}")]
    Load(#[source] ExchangeError),
}

/// Collaborator told about fills so it can re-read the affected position.
#[async_trait]
pub trait Portfolio: Send + Sync {
    async fn refresh(&self, symbol: &str) -> Result<(), PortfolioError>;
}

/// Long or short exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

/// An open position as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(default)]
    pub side: Option<PositionSide>,
    #[serde(rename = "qty", deserialize_with = "required_decimal")]
    pub quantity: Decimal,
    #[serde(default, rename = "qty_available", deserialize_with = "lenient_decimal")]
    pub quantity_available: Option<Decimal>,
    #[serde(default, rename = "avg_entry_price", deserialize_with = "lenient_decimal")]
    pub average_entry_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub market_value: Option<Decimal>,
    #[serde(default, rename = "unrealized_pl", deserialize_with = "lenient_decimal")]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(default = "Utc::now", skip_deserializing)]
    pub refreshed_at: DateTime<Utc>,
}

impl Position {
    /// Decode a position from the broker's JSON shape.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ExchangeError> {
        Position::deserialize(value)
            .map_err(|e| ExchangeError::Other(format!("invalid position: {}", e)))
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }
}

fn required_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient_decimal(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("missing decimal value"))
}

/// Source of broker positions.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Current position for `symbol`, or `None` when flat.
    async fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, ExchangeError>;

    async fn fetch_positions(&self) -> Result<Vec<Position>, ExchangeError>;
}

#[async_trait]
impl<S: PositionSource + ?Sized> PositionSource for std::sync::Arc<S> {
    async fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, ExchangeError> {
        (**self).fetch_position(symbol).await
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        (**self).fetch_positions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decode_broker_position() {
        let position = Position::from_value(&json!({
            "asset_id": "904837e3-3b76-47ec-b432-046db621571b",
            "symbol": "AAPL",
            "exchange": "NASDAQ",
            "asset_class": "us_equity",
            "avg_entry_price": "100.0",
            "qty": "5",
            "qty_available": "4",
            "side": "long",
            "market_value": "600.0",
            "unrealized_pl": "100.0"
        }))
        .unwrap();

        assert_eq!(position.symbol, "AAPL");
        assert_eq!(position.quantity, dec!(5));
        assert_eq!(position.quantity_available, Some(dec!(4)));
        assert_eq!(position.side, Some(PositionSide::Long));
        assert_eq!(position.unrealized_pnl, Some(dec!(100.0)));
        assert!(!position.is_flat());
    }

    #[test]
    fn test_decode_requires_quantity() {
        assert!(Position::from_value(&json!({"symbol": "AAPL"})).is_err());
        assert!(Position::from_value(&json!({"symbol": "AAPL", "qty": null})).is_err());
    }
}
