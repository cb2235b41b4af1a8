//! Cross-thread control of the connection loop.
//!
//! External callers never touch the connection directly. They either flip
//! the [`StopToken`] or post a [`ControlCommand`] into the loop's mailbox and
//! wait on the attached completion.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use super::dispatcher::TradeUpdateHandler;

/// Cooperative cancellation flag shared by the loop and its handles.
///
/// Stopping is idempotent and may happen before the loop starts.
#[derive(Clone, Debug)]
pub struct StopToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

impl StopToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop. Returns `true` only for the first request.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Work handed to the loop by another thread or task.
pub(crate) enum ControlCommand {
    /// Install a handler; subscribes immediately when already streaming.
    Register {
        handler: Arc<dyn TradeUpdateHandler>,
        ack: oneshot::Sender<()>,
    },
    /// Re-send the subscription on the live connection, if any.
    Subscribe { ack: oneshot::Sender<()> },
}

impl ControlCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            ControlCommand::Register { .. } => "register",
            ControlCommand::Subscribe { .. } => "subscribe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_is_idempotent() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
        assert!(token.stop());
        assert!(!token.stop());
        assert!(token.is_stopped());
    }

    #[test]
    fn test_clones_share_state() {
        let token = StopToken::new();
        let clone = token.clone();
        clone.stop();
        assert!(token.is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_resolves_when_already_stopped() {
        let token = StopToken::new();
        token.stop();
        tokio::time::timeout(Duration::from_millis(50), token.stopped())
            .await
            .expect("stopped() should resolve immediately");
    }

    #[tokio::test]
    async fn test_stopped_wakes_on_stop_from_other_thread() {
        let token = StopToken::new();
        let remote = token.clone();
        let waiter = tokio::spawn(async move { token.stopped().await });

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.stop();
        });

        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
