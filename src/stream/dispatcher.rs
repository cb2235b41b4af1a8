//! Routes decoded frames to the registered handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::StreamError;
use super::protocol::{StreamEvent, TradeUpdate, TRADE_UPDATES};

/// Consumer of `trade_updates` frames.
///
/// Invocations are strictly sequential: the loop awaits each call before
/// reading the next frame.
#[async_trait]
pub trait TradeUpdateHandler: Send + Sync {
    /// Stream this handler subscribes to.
    fn stream(&self) -> &str {
        TRADE_UPDATES
    }

    async fn on_trade_update(&self, update: TradeUpdate);
}

/// What happened to a dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    NoHandler,
    Ignored,
}

#[derive(Default)]
pub struct EventDispatcher {
    handler: Option<Arc<dyn TradeUpdateHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `handler` targets a stream this client can subscribe to.
    pub fn validate(handler: &dyn TradeUpdateHandler) -> Result<(), StreamError> {
        let stream = handler.stream();
        if stream != TRADE_UPDATES {
            return Err(StreamError::InvalidHandler(format!(
                "unsupported stream '{}', expected '{}'",
                stream, TRADE_UPDATES
            )));
        }
        Ok(())
    }

    /// Install `handler`, replacing any previous one.
    pub fn set_handler(&mut self, handler: Arc<dyn TradeUpdateHandler>) -> Result<(), StreamError> {
        Self::validate(handler.as_ref())?;
        self.handler = Some(handler);
        Ok(())
    }

    pub fn take_handler(&mut self) -> Option<Arc<dyn TradeUpdateHandler>> {
        self.handler.take()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Hand `event` to the handler if it belongs to the handler's stream.
    pub async fn dispatch(&self, event: StreamEvent) -> DispatchOutcome {
        let Some(handler) = self.handler.as_ref() else {
            debug!(stream = ?event.stream(), "No handler registered, dropping frame");
            return DispatchOutcome::NoHandler;
        };

        match event {
            StreamEvent::TradeUpdate(update) if handler.stream() == TRADE_UPDATES => {
                handler.on_trade_update(update).await;
                DispatchOutcome::Delivered
            }
            other => {
                debug!(stream = ?other.stream(), "Ignoring frame for unsubscribed stream");
                DispatchOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::Order;
    use crate::stream::protocol::TradeEventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TradeUpdateHandler for CountingHandler {
        async fn on_trade_update(&self, _update: TradeUpdate) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct WrongStreamHandler;

    #[async_trait]
    impl TradeUpdateHandler for WrongStreamHandler {
        fn stream(&self) -> &str {
            "account_updates"
        }

        async fn on_trade_update(&self, _update: TradeUpdate) {}
    }

    fn fill_event() -> StreamEvent {
        StreamEvent::TradeUpdate(TradeUpdate {
            kind: TradeEventKind::Fill,
            order: Order::new("o1", "AAPL"),
            execution: None,
        })
    }

    #[tokio::test]
    async fn test_dispatch_without_handler() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.dispatch(fill_event()).await, DispatchOutcome::NoHandler);
    }

    #[tokio::test]
    async fn test_dispatch_routes_trade_updates_only() {
        let handler = Arc::new(CountingHandler::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.set_handler(handler.clone()).unwrap();

        assert_eq!(dispatcher.dispatch(fill_event()).await, DispatchOutcome::Delivered);
        assert_eq!(
            dispatcher
                .dispatch(StreamEvent::Other {
                    stream: Some("account_updates".to_string())
                })
                .await,
            DispatchOutcome::Ignored
        );
        assert_eq!(
            dispatcher
                .dispatch(StreamEvent::SubscriptionAck { streams: vec![] })
                .await,
            DispatchOutcome::Ignored
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_for_unsupported_stream_is_rejected() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher.set_handler(Arc::new(WrongStreamHandler)).unwrap_err();
        assert!(matches!(err, StreamError::InvalidHandler(_)));
        assert!(!dispatcher.has_handler());
    }
}
