//! Local order entry on top of the broker gateway.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::ledger::OrderLedger;
use super::request::{NewOrderRequest, OrderError, ReplaceOrderRequest};
use super::types::{Order, OrderId};
use crate::exchange::ExchangeError;

/// Broker order endpoints.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_order(&self, request: &NewOrderRequest) -> Result<Order, ExchangeError>;

    async fn cancel_order(&self, id: &OrderId) -> Result<(), ExchangeError>;

    /// Replace an open order; the broker answers with the new order.
    async fn replace_order(
        &self,
        id: &OrderId,
        request: &ReplaceOrderRequest,
    ) -> Result<Order, ExchangeError>;

    async fn list_open_orders(&self) -> Result<Vec<Order>, ExchangeError>;
}

/// Submits, cancels and replaces orders and keeps the ledger in step with
/// the responses.
///
/// The trade-update stream stays the authority: a cancel only asks the
/// broker, and the ledger changes when the `canceled` event arrives.
pub struct OrderDesk {
    gateway: Arc<dyn OrderGateway>,
    ledger: OrderLedger,
}

impl OrderDesk {
    pub fn new(gateway: Arc<dyn OrderGateway>, ledger: OrderLedger) -> Self {
        Self { gateway, ledger }
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Seed the ledger with the broker's open orders. Returns the count.
    pub async fn load_open_orders(&self) -> Result<usize, OrderError> {
        let orders = self.gateway.list_open_orders().await?;
        let count = orders.len();
        self.ledger.seed(orders).await;
        info!(orders = count, "Loaded open orders");
        Ok(count)
    }

    #[instrument(skip(self, request), fields(symbol = %request.symbol, side = %request.side))]
    pub async fn submit(&self, request: &NewOrderRequest) -> Result<Order, OrderError> {
        request.validate()?;
        let order = self.gateway.submit_order(request).await?;

        info!(
            order_id = %order.id,
            status = ?order.status,
            "Order submitted"
        );

        if order.is_terminal() {
            warn!(order_id = %order.id, "Order already closed on submit");
        } else {
            self.ledger.insert_submitted(order.clone()).await;
        }
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &OrderId) -> Result<(), OrderError> {
        self.gateway.cancel_order(id).await.map_err(|e| match e {
            ExchangeError::NotFound(_) => OrderError::NotFound(id.clone()),
            other => OrderError::Exchange(other),
        })?;
        info!(order_id = %id, "Cancel requested");
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn replace(
        &self,
        id: &OrderId,
        request: ReplaceOrderRequest,
    ) -> Result<Order, OrderError> {
        let current = self
            .ledger
            .get(id)
            .await
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;

        let request = request.applicable_to(current.order_type);
        request.validate()?;

        let replacement = self.gateway.replace_order(id, &request).await?;
        self.ledger.remove(id).await;
        self.ledger.insert_submitted(replacement.clone()).await;

        info!(
            order_id = %id,
            replacement_id = %replacement.id,
            "Order replaced"
        );
        Ok(replacement)
    }
}
