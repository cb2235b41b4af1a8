//! Order Management Module
//!
//! Keeps a local view of open orders in sync with the broker.
//!
//! # Architecture
//!
//! - `OrderLedger` - Shared table of open orders, replaced wholesale per event
//! - `OrderReconciler` - Trade-update handler applying events to the ledger
//! - `OrderDesk` - Submit, cancel and replace through an `OrderGateway`
//! - Core types - `OrderId`, `Order`, `OrderStatus`, `Amount`
//!
//! # Example
//!
//! ```ignore
//! use orderstream::orders::{OrderLedger, OrderReconciler};
//!
//! let ledger = OrderLedger::new();
//! let reconciler = Arc::new(OrderReconciler::new(ledger.clone(), portfolio));
//! manager.register_handler(reconciler).await?;
//! ```

mod desk;
mod ledger;
mod reconciler;
mod request;
mod types;

pub use desk::{OrderDesk, OrderGateway};
pub use ledger::{LedgerSnapshot, OrderLedger};
pub use reconciler::{LedgerEffect, OrderReconciler, ReconcileOutcome, RefreshOutcome};
pub use request::{NewOrderRequest, OrderError, ReplaceOrderRequest, StopLoss, TakeProfit};
pub use types::{
    Amount, AssetClass, Order, OrderClass, OrderDecodeError, OrderId, OrderStatus,
    OrderTimestamps, OrderType, PositionIntent, TimeInForce,
};

pub(crate) use types::lenient_decimal;
