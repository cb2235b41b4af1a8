//! In-memory ledger of open orders.
//!
//! The ledger is a cache of the broker's view: it holds the last known
//! non-terminal snapshot of every open order and may lag the remote state
//! between events. It is shared between the stream loop (the only writer in
//! normal operation) and any number of readers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{Order, OrderId};
use crate::metrics;

/// Number of recently closed ids remembered by default.
const DEFAULT_CLOSED_CAPACITY: usize = 1024;

/// Bounded FIFO set of ids removed from the ledger.
#[derive(Debug, Default)]
struct ClosedIds {
    order: VecDeque<OrderId>,
    members: HashSet<OrderId>,
    capacity: usize,
}

impl ClosedIds {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, id: &OrderId) {
        if self.capacity == 0 || self.members.contains(id) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        self.order.push_back(id.clone());
        self.members.insert(id.clone());
    }

    fn contains(&self, id: &OrderId) -> bool {
        self.members.contains(id)
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    orders: HashMap<OrderId, Order>,
    closed: ClosedIds,
}

/// Thread-safe table of open orders keyed by order id.
///
/// # Thread Safety
///
/// A single `RwLock` guards the table: `upsert`/`remove` take it exclusively,
/// `get`/`snapshot` share it. Readers that need a consistent view across
/// several lookups should take a [`LedgerSnapshot`] instead of calling `get`
/// repeatedly.
#[derive(Clone, Debug)]
pub struct OrderLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::with_closed_capacity(DEFAULT_CLOSED_CAPACITY)
    }

    /// Create a ledger that remembers up to `capacity` removed ids.
    pub fn with_closed_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(LedgerInner {
                orders: HashMap::new(),
                closed: ClosedIds::with_capacity(capacity),
            })),
        }
    }

    /// Replace-or-insert by id. The previous entry, if any, is discarded
    /// wholesale and returned; fields are never merged.
    pub async fn upsert(&self, order: Order) -> Option<Order> {
        let mut inner = self.inner.write().await;
        let id = order.id.clone();
        let previous = inner.orders.insert(id.clone(), order);
        metrics::OPEN_ORDERS.set(inner.orders.len() as i64);
        debug!(order_id = %id, replaced = previous.is_some(), "Ledger upsert");
        previous
    }

    /// Delete by id. Removing an absent id is a no-op that returns `None`.
    pub async fn remove(&self, id: &OrderId) -> Option<Order> {
        let mut inner = self.inner.write().await;
        let removed = inner.orders.remove(id);
        inner.closed.record(id);
        metrics::OPEN_ORDERS.set(inner.orders.len() as i64);
        debug!(order_id = %id, was_present = removed.is_some(), "Ledger remove");
        removed
    }

    /// Insert an order returned by a local submit.
    ///
    /// The stream can report on the order before the submit response reaches
    /// the caller, so this returns `false` without touching the ledger when
    /// the id is already present or a terminal event for it was processed.
    pub async fn insert_submitted(&self, order: Order) -> bool {
        let mut inner = self.inner.write().await;
        if inner.closed.contains(&order.id) {
            debug!(order_id = %order.id, "Order already closed, skipping insert");
            return false;
        }
        if inner.orders.contains_key(&order.id) {
            debug!(order_id = %order.id, "Stream already reported order, keeping its snapshot");
            return false;
        }
        inner.orders.insert(order.id.clone(), order);
        metrics::OPEN_ORDERS.set(inner.orders.len() as i64);
        true
    }

    /// Replace the whole table with `orders`, e.g. the open orders fetched at start-up.
    pub async fn seed(&self, orders: impl IntoIterator<Item = Order>) {
        let mut inner = self.inner.write().await;
        inner.orders = orders.into_iter().map(|o| (o.id.clone(), o)).collect();
        metrics::OPEN_ORDERS.set(inner.orders.len() as i64);
        debug!(count = inner.orders.len(), "Ledger seeded");
    }

    pub async fn get(&self, id: &OrderId) -> Option<Order> {
        self.inner.read().await.orders.get(id).cloned()
    }

    pub async fn contains(&self, id: &OrderId) -> bool {
        self.inner.read().await.orders.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.orders.is_empty()
    }

    /// Open orders for a symbol.
    pub async fn orders_for_symbol(&self, symbol: &str) -> Vec<Order> {
        self.inner
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Immutable point-in-time copy of the table.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.read().await;
        LedgerSnapshot {
            orders: inner.orders.clone(),
            taken_at: Utc::now(),
        }
    }
}

/// Point-in-time copy of the ledger, unaffected by later mutation.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    orders: HashMap<OrderId, Order>,
    taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}
