//! Logging Module
//!
//! - `StreamObserver` - Pluggable lifecycle observer for the connection loop
//! - `TracingObserver` - Structured `tracing` implementation
//! - `LogThrottle` - Rate limiter for repetitive log lines

pub mod observer;
pub mod throttle;

pub use observer::{StreamObserver, TracingObserver};
pub use throttle::LogThrottle;
