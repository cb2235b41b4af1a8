//! Trade-update stream client.
//!
//! # Architecture
//!
//! - `ConnectionManager` - Owns the connection state machine and reconnects on failure
//! - `ConnectionHandle` - Thread-safe control surface (register, subscribe, stop)
//! - `EventDispatcher` - Routes decoded frames to the registered handler
//! - `protocol` - Outbound frames and typed decoding of inbound frames
//!
//! # Example
//!
//! ```ignore
//! use orderstream::stream::{ConnectionManager, StreamConfig, WsTransport};
//!
//! let mut manager = ConnectionManager::new(WsTransport::new(), config);
//! manager.register_handler(reconciler).await?;
//! let handle = manager.handle();
//! tokio::spawn(async move { manager.run().await });
//! // later, from anywhere
//! handle.stop();
//! ```

pub mod backoff;
pub mod config;
mod connection;
mod control;
pub mod dispatcher;
mod error;
pub mod protocol;
mod state;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use config::{StreamConfig, StreamConfigError, LIVE_STREAM_URL, PAPER_STREAM_URL};
pub use connection::{ConnectionHandle, ConnectionManager};
pub use control::StopToken;
pub use dispatcher::{DispatchOutcome, EventDispatcher, TradeUpdateHandler};
pub use error::{StreamError, TransportError};
pub use protocol::{
    decode_frame, AuthResult, Execution, StreamEvent, TradeEventKind, TradeUpdate, TRADE_UPDATES,
};
pub use state::ConnectionState;
pub use transport::{Connection, Transport, WsConnection, WsTransport};
