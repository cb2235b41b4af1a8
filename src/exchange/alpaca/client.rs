//! Alpaca REST client.
//!
//! Order entry and position reads for US equities, rate limited to stay
//! inside the broker's request budget.

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use apca::api::v2::asset;
use apca::api::v2::clock as alpaca_clock;
use apca::api::v2::order as alpaca_order;
use apca::api::v2::orders as alpaca_orders;
use apca::api::v2::position as alpaca_position;
use apca::api::v2::positions as alpaca_positions;
use apca::{ApiInfo, Client, RequestError};

use super::utils;
use crate::exchange::{AppEnv, ExchangeConfig, ExchangeError, MarketClock};
use crate::orders::{NewOrderRequest, Order, OrderGateway, OrderId, ReplaceOrderRequest};
use crate::portfolio::{Position, PositionSource};

pub const PAPER_API_URL: &str = "https://paper-api.alpaca.markets";
pub const LIVE_API_URL: &str = "https://api.alpaca.markets";

/// Alpaca allows 200 requests per minute.
const RATE_LIMIT_NZ: NonZeroU32 = match NonZeroU32::new(3) {
    Some(v) => v,
    None => panic!("RATE_LIMIT must be non-zero"),
};

type DirectLimiter = RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>;

/// Alpaca client implementing [`OrderGateway`] and [`PositionSource`].
pub struct AlpacaClient {
    client: Client,
    env: AppEnv,
    rate_limiter: Arc<DirectLimiter>,
}

impl AlpacaClient {
    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let base_url = if config.env.is_paper() {
            PAPER_API_URL
        } else {
            LIVE_API_URL
        };

        info!(env = %config.env, "Initializing Alpaca client");

        let api_info = ApiInfo::from_parts(base_url, &config.api_key, &config.api_secret)
            .map_err(|e| {
                ExchangeError::Configuration(format!("Failed to create Alpaca API info: {}", e))
            })?;

        Ok(Self {
            client: Client::new(api_info),
            env: config.env,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(RATE_LIMIT_NZ))),
        })
    }

    pub fn env(&self) -> AppEnv {
        self.env
    }

    /// Current market session state.
    pub async fn clock(&self) -> Result<MarketClock, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let clock = self
            .client
            .issue::<alpaca_clock::Get>(&())
            .await
            .map_err(|e| request_error("Clock request failed", e))?;

        debug!(is_open = clock.open, next_open = %clock.next_open, "Fetched market clock");
        Ok(utils::clock_from_alpaca(&clock))
    }

    fn order_uuid(id: &OrderId) -> Result<alpaca_order::Id, ExchangeError> {
        Uuid::parse_str(id.as_str())
            .map(alpaca_order::Id)
            .map_err(|_| ExchangeError::NotFound(format!("order {}", id)))
    }
}

fn request_error<E: std::fmt::Display>(context: &str, err: RequestError<E>) -> ExchangeError {
    match err {
        RequestError::Endpoint(e) => ExchangeError::Rejected(format!("{}: {}", context, e)),
        other => ExchangeError::Network(format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl OrderGateway for AlpacaClient {
    async fn submit_order(&self, request: &NewOrderRequest) -> Result<Order, ExchangeError> {
        let create = utils::to_create_request(request)?;
        self.rate_limiter.until_ready().await;

        let order = self
            .client
            .issue::<alpaca_order::Create>(&create)
            .await
            .map_err(|e| request_error("Order failed", e))?;

        info!(
            order_id = %order.id.as_hyphenated(),
            symbol = %order.symbol,
            status = ?order.status,
            "Alpaca order created"
        );
        utils::order_from_alpaca(&order)
    }

    async fn cancel_order(&self, id: &OrderId) -> Result<(), ExchangeError> {
        let alpaca_id = Self::order_uuid(id)?;
        self.rate_limiter.until_ready().await;

        match self.client.issue::<alpaca_order::Delete>(&alpaca_id).await {
            Ok(()) => Ok(()),
            Err(RequestError::Endpoint(alpaca_order::DeleteError::NotFound(_))) => {
                Err(ExchangeError::NotFound(format!("order {}", id)))
            }
            Err(e) => Err(request_error("Cancel failed", e)),
        }
    }

    async fn replace_order(
        &self,
        id: &OrderId,
        request: &ReplaceOrderRequest,
    ) -> Result<Order, ExchangeError> {
        let alpaca_id = Self::order_uuid(id)?;
        let change = utils::to_change_request(request)?;
        self.rate_limiter.until_ready().await;

        match self
            .client
            .issue::<alpaca_order::Change>(&(alpaca_id, change))
            .await
        {
            Ok(order) => utils::order_from_alpaca(&order),
            Err(RequestError::Endpoint(alpaca_order::ChangeError::NotFound(_))) => {
                Err(ExchangeError::NotFound(format!("order {}", id)))
            }
            Err(e) => Err(request_error("Replace failed", e)),
        }
    }

    async fn list_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let request = alpaca_orders::ListReq {
            status: alpaca_orders::Status::Open,
            ..Default::default()
        };
        let orders = self
            .client
            .issue::<alpaca_orders::List>(&request)
            .await
            .map_err(|e| request_error("Listing orders failed", e))?;

        debug!(count = orders.len(), "Fetched open orders");
        orders.iter().map(utils::order_from_alpaca).collect()
    }
}

#[async_trait]
impl PositionSource for AlpacaClient {
    async fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let sym = asset::Symbol::Sym(utils::to_alpaca_symbol(symbol).into_owned());
        match self.client.issue::<alpaca_position::Get>(&sym).await {
            Ok(position) => {
                let position = utils::position_from_alpaca(&position)?;
                debug!(symbol = %symbol, quantity = %position.quantity, "Position found");
                Ok(Some(position))
            }
            Err(RequestError::Endpoint(alpaca_position::GetError::NotFound(_))) => {
                debug!(symbol = %symbol, "No position found");
                Ok(None)
            }
            Err(e) => Err(request_error("Failed to get position", e)),
        }
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let positions = self
            .client
            .issue::<alpaca_positions::List>(&())
            .await
            .map_err(|e| request_error("Failed to list positions", e))?;

        positions.iter().map(utils::position_from_alpaca).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(env: AppEnv) -> ExchangeConfig {
        ExchangeConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            env,
        }
    }

    #[tokio::test]
    async fn test_from_config_keeps_env() {
        let client = AlpacaClient::from_config(&config(AppEnv::Paper)).unwrap();
        assert_eq!(client.env(), AppEnv::Paper);
    }

    #[test]
    fn test_order_uuid_rejects_non_uuid() {
        assert!(AlpacaClient::order_uuid(&OrderId::new("not-a-uuid")).is_err());
        assert!(
            AlpacaClient::order_uuid(&OrderId::new("61e69015-8549-4bfd-b9c3-01e75843f47d"))
                .is_ok()
        );
    }
}
