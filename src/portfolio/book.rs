//! Concurrent position cache.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use super::{Portfolio, PortfolioError, Position, PositionSource};

/// Position cache backed by a [`PositionSource`].
///
/// Uses `DashMap` so the stream loop can refresh one symbol while readers
/// look up others without a global lock.
pub struct PositionBook<S> {
    source: S,
    positions: DashMap<String, Position>,
}

impl<S: PositionSource> PositionBook<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            positions: DashMap::new(),
        }
    }

    /// Replace the cache with every open position. Returns the count loaded.
    pub async fn load_all(&self) -> Result<usize, PortfolioError> {
        let fetched = self
            .source
            .fetch_positions()
            .await
            .map_err(PortfolioError::Load)?;

        self.positions.clear();
        for position in fetched {
            self.positions.insert(position.symbol.clone(), position);
        }
        info!(positions = self.positions.len(), "Loaded existing positions");
        Ok(self.positions.len())
    }

    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.get(symbol).map(|p| p.value().clone())
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.iter().map(|p| p.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[async_trait]
impl<S: PositionSource> Portfolio for PositionBook<S> {
    async fn refresh(&self, symbol: &str) -> Result<(), PortfolioError> {
        let fetched = self
            .source
            .fetch_position(symbol)
            .await
            .map_err(|source| PortfolioError::Refresh {
                symbol: symbol.to_string(),
                source,
            })?;

        match fetched {
            Some(mut position) if !position.is_flat() => {
                position.refreshed_at = Utc::now();
                debug!(symbol = %symbol, quantity = %position.quantity, "Position refreshed");
                self.positions.insert(symbol.to_string(), position);
            }
            _ => {
                debug!(symbol = %symbol, "Position closed");
                self.positions.remove(symbol);
            }
        }
        Ok(())
    }
}
