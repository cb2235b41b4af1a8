//! Injected observer for connection lifecycle events.
//!
//! The connection manager reports through a [`StreamObserver`] instead of
//! logging directly, so tests can record what happened and deployments can
//! route events wherever they like. [`TracingObserver`] is the default.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::throttle::LogThrottle;
use crate::stream::{ConnectionState, StreamError};

/// Receives lifecycle notifications from the connection loop.
///
/// Every method has an empty default so implementors only override what
/// they care about.
pub trait StreamObserver: Send + Sync {
    fn on_state_change(&self, _from: ConnectionState, _to: ConnectionState) {}

    /// A connection cycle failed; the loop will retry after `retry_in`.
    fn on_connection_failure(&self, _error: &StreamError, _attempt: u32, _retry_in: Duration) {}

    /// A bounded receive elapsed without traffic.
    fn on_idle(&self, _waited: Duration) {}

    /// An inbound frame was dropped.
    fn on_malformed(&self, _error: &StreamError, _frame: &str) {}

    /// The server confirmed the subscribed streams.
    fn on_subscribed(&self, _streams: &[String]) {}
}

/// Longest frame excerpt included in malformed-frame logs.
const FRAME_EXCERPT: usize = 256;

/// Observer that emits structured `tracing` events.
pub struct TracingObserver {
    idle: Mutex<LogThrottle>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::with_idle_interval(Duration::from_secs(60))
    }

    /// Emit the "no updates" line at most once per `interval`.
    pub fn with_idle_interval(interval: Duration) -> Self {
        Self {
            idle: Mutex::new(LogThrottle::new(interval)),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamObserver for TracingObserver {
    fn on_state_change(&self, from: ConnectionState, to: ConnectionState) {
        info!(from = %from, to = %to, "Stream connection state changed");
    }

    fn on_connection_failure(&self, error: &StreamError, attempt: u32, retry_in: Duration) {
        warn!(
            error = %error,
            kind = error.kind(),
            attempt = attempt,
            retry_in_ms = retry_in.as_millis() as u64,
            "Stream connection failed, retrying"
        );
    }

    fn on_idle(&self, waited: Duration) {
        let mut throttle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if throttle.should_log() {
            let suppressed = throttle.take_suppressed();
            debug!(
                waited_ms = waited.as_millis() as u64,
                suppressed = suppressed,
                "No trade updates received yet"
            );
        }
    }

    fn on_malformed(&self, error: &StreamError, frame: &str) {
        let excerpt: String = frame.chars().take(FRAME_EXCERPT).collect();
        warn!(error = %error, frame = %excerpt, "Dropping malformed frame");
    }

    fn on_subscribed(&self, streams: &[String]) {
        info!(streams = ?streams, "Listening for stream updates");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_observer_handles_every_event() {
        let observer = TracingObserver::with_idle_interval(Duration::from_secs(1));
        observer.on_state_change(ConnectionState::Idle, ConnectionState::Connecting);
        observer.on_connection_failure(
            &StreamError::Authentication("unauthorized".to_string()),
            2,
            Duration::from_millis(500),
        );
        observer.on_idle(Duration::from_secs(5));
        observer.on_idle(Duration::from_secs(5));
        observer.on_malformed(&StreamError::Malformed("bad".to_string()), &"x".repeat(1000));
        observer.on_subscribed(&["trade_updates".to_string()]);

        let suppressed = observer.idle.lock().unwrap().take_suppressed();
        assert_eq!(suppressed, 1);
    }
}
