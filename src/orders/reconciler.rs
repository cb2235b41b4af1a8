//! Order reconciliation from trade updates.
//!
//! Applies each trade-update event to the local order ledger and asks the
//! portfolio to re-read positions after fills.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::ledger::OrderLedger;
use crate::metrics;
use crate::portfolio::Portfolio;
use crate::stream::{TradeEventKind, TradeUpdate, TradeUpdateHandler};

/// Effect of an event on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// Entry removed (`was_present` is false for a replayed terminal event)
    Removed { was_present: bool },
    /// Entry replaced or inserted
    Upserted { replaced: bool },
}

/// Outcome of the portfolio side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotRequested,
    Refreshed,
    Failed,
}

/// What reconciling one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub ledger: LedgerEffect,
    pub refresh: RefreshOutcome,
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = match self.ledger {
            LedgerEffect::Removed { was_present: true } => "Removed",
            LedgerEffect::Removed { was_present: false } => "AlreadyAbsent",
            LedgerEffect::Upserted { replaced: true } => "Replaced",
            LedgerEffect::Upserted { replaced: false } => "Inserted",
        };
        let refresh = match self.refresh {
            RefreshOutcome::NotRequested => "NoRefresh",
            RefreshOutcome::Refreshed => "Refreshed",
            RefreshOutcome::Failed => "RefreshFailed",
        };
        write!(f, "{}/{}", ledger, refresh)
    }
}

/// How an event kind maps onto the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Remove and refresh the position
    Fill,
    /// Upsert and refresh the position
    PartialFill,
    /// Remove; the order can never execute
    Close,
    /// Full replace of the snapshot
    Upsert,
}

impl Rule {
    fn for_kind(kind: &TradeEventKind) -> Self {
        match kind {
            TradeEventKind::Fill => Rule::Fill,
            TradeEventKind::PartialFill => Rule::PartialFill,
            TradeEventKind::Canceled
            | TradeEventKind::Expired
            | TradeEventKind::Rejected
            | TradeEventKind::Suspended => Rule::Close,
            _ => Rule::Upsert,
        }
    }
}

/// Trade-update handler that keeps the [`OrderLedger`] in sync.
///
/// Every rule is safe under replay: removing an absent id is a no-op and
/// upserts replace rather than merge. The ledger is always updated before
/// the portfolio refresh, and refresh failures are logged and swallowed.
pub struct OrderReconciler {
    ledger: OrderLedger,
    portfolio: Arc<dyn Portfolio>,
}

impl OrderReconciler {
    pub fn new(ledger: OrderLedger, portfolio: Arc<dyn Portfolio>) -> Self {
        Self { ledger, portfolio }
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Apply one trade update.
    pub async fn apply(&self, update: TradeUpdate) -> ReconcileOutcome {
        let rule = Rule::for_kind(&update.kind);
        let kind = update.kind.as_str().to_string();
        let symbol = update.order.symbol.clone();
        let id = update.order.id.clone();
        metrics::record_trade_event(&kind);

        let ledger = match rule {
            Rule::Fill | Rule::Close => {
                let was_present = self.ledger.remove(&id).await.is_some();
                info!(
                    order_id = %id,
                    symbol = %symbol,
                    event = %kind,
                    was_present = was_present,
                    "Order closed, removed from active orders"
                );
                LedgerEffect::Removed { was_present }
            }
            Rule::PartialFill | Rule::Upsert => {
                let replaced = self.ledger.upsert(update.order).await.is_some();
                debug!(
                    order_id = %id,
                    symbol = %symbol,
                    event = %kind,
                    replaced = replaced,
                    "Order snapshot stored"
                );
                LedgerEffect::Upserted { replaced }
            }
        };

        let refresh = match rule {
            Rule::Fill | Rule::PartialFill => self.refresh_position(&symbol).await,
            Rule::Close | Rule::Upsert => RefreshOutcome::NotRequested,
        };

        ReconcileOutcome { ledger, refresh }
    }

    async fn refresh_position(&self, symbol: &str) -> RefreshOutcome {
        match self.portfolio.refresh(symbol).await {
            Ok(()) => {
                metrics::record_refresh(true);
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                metrics::record_refresh(false);
                warn!(symbol = %symbol, error = %e, "Portfolio refresh failed after fill");
                RefreshOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl TradeUpdateHandler for OrderReconciler {
    async fn on_trade_update(&self, update: TradeUpdate) {
        let id = update.order.id.clone();
        let outcome = self.apply(update).await;
        debug!(order_id = %id, outcome = %outcome, "Trade update reconciled");
    }
}
