mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use orderstream::stream::{
    ConnectionHandle, ConnectionManager, ConnectionState, StreamError, TradeUpdate,
    TradeUpdateHandler,
};
use tokio::task::JoinHandle;

struct Harness {
    transport: MockTransport,
    observer: Arc<RecordingObserver>,
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

fn start(transport: &MockTransport) -> Harness {
    let observer = Arc::new(RecordingObserver::default());
    let mut manager =
        ConnectionManager::with_observer(transport.clone(), test_config(), observer.clone());
    let handle = manager.handle();
    let task = tokio::spawn(async move { manager.run().await });
    Harness {
        transport: transport.clone(),
        observer,
        handle,
        task,
    }
}

async fn reach(handle: &ConnectionHandle, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(60), handle.wait_for_state(state))
        .await
        .expect("state not reached");
}

impl Harness {
    async fn shutdown(self) -> (MockTransport, Arc<RecordingObserver>, ConnectionHandle) {
        self.handle.stop();
        tokio::time::timeout(Duration::from_secs(60), self.task)
            .await
            .expect("loop did not stop")
            .expect("loop panicked");
        (self.transport, self.observer, self.handle)
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_connection_until_handler_registered() {
    let transport = MockTransport::new();
    transport.accept_authorized();
    let harness = start(&transport);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.connects(), 0);
    assert_eq!(harness.handle.state(), ConnectionState::Idle);

    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("\"authenticate\""));
    assert!(sent[0].1.contains("\"key_id\":\"key\""));
    assert!(sent[1].1.contains("\"trade_updates\""));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handler_registered_before_run_is_used() {
    let transport = MockTransport::new();
    let server = transport.accept_authorized();
    let observer = Arc::new(RecordingObserver::default());
    let mut manager =
        ConnectionManager::with_observer(transport.clone(), test_config(), observer.clone());
    let handler = Arc::new(RecordingHandler::default());
    manager.register_handler(handler.clone()).await.unwrap();

    let handle = manager.handle();
    let task = tokio::spawn(async move { manager.run().await });
    reach(&handle, ConnectionState::Streaming).await;

    server.frame(trade_update("new", "o1", "AAPL"));
    eventually(|| handler.count() == 1).await;

    Harness {
        transport,
        observer,
        handle,
        task,
    }
    .shutdown()
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_connection_once() {
    let transport = MockTransport::new();
    transport.accept_authorized();
    let harness = start(&transport);
    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;
    assert!(harness.handle.is_running());

    harness.handle.stop();
    harness.handle.stop();
    let (transport, observer, handle) = harness.shutdown().await;

    assert_eq!(transport.closes(), 1);
    assert_eq!(transport.connects(), 1);
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(!handle.is_running());
    let entered = observer.states_entered();
    assert_eq!(
        &entered[entered.len() - 2..],
        &[ConnectionState::Closing, ConnectionState::Disconnected]
    );
    assert!(observer.failures.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_handler_never_connects() {
    let transport = MockTransport::new();
    transport.accept_authorized();
    let harness = start(&transport);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let (transport, _observer, handle) = harness.shutdown().await;

    assert_eq!(transport.connects(), 0);
    assert_eq!(handle.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_order() {
    let transport = MockTransport::new();
    transport.accept_authorized();
    let harness = start(&transport);
    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;
    let (_transport, observer, _handle) = harness.shutdown().await;

    assert_eq!(
        observer.states_entered(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Authenticating,
            ConnectionState::Subscribing,
            ConnectionState::Streaming,
            ConnectionState::Closing,
            ConnectionState::Disconnected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeouts_keep_connection_open() {
    let transport = MockTransport::new();
    let server = transport.accept_authorized();
    let harness = start(&transport);
    let handler = Arc::new(RecordingHandler::default());
    harness.handle.register_handler(handler.clone()).await.unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(harness.observer.idle.load(Ordering::SeqCst) >= 5);
    assert_eq!(harness.handle.state(), ConnectionState::Streaming);

    server.frame(trade_update("new", "o1", "AAPL"));
    eventually(|| handler.count() == 1).await;

    let (transport, observer, _) = harness.shutdown().await;
    assert_eq!(transport.connects(), 1);
    assert!(observer.failures.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_is_retried() {
    let transport = MockTransport::new();
    transport.accept().frame(auth_denied());
    transport.accept_authorized();
    let harness = start(&transport);
    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();

    reach(&harness.handle, ConnectionState::Streaming).await;
    assert_eq!(transport.connects(), 2);
    // The rejected connection was closed before retrying.
    assert_eq!(transport.closes(), 1);
    assert_eq!(harness.observer.failure_kinds(), vec!["authentication"]);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_auth_times_out() {
    let transport = MockTransport::new();
    let _silent = transport.accept();
    transport.accept_authorized();
    let harness = start(&transport);
    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();

    reach(&harness.handle, ConnectionState::Streaming).await;
    assert_eq!(harness.observer.failure_kinds(), vec!["timeout"]);
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transport_drop_reconnects_and_resubscribes() {
    let transport = MockTransport::new();
    let first = transport.accept_authorized();
    let second = transport.accept_authorized();
    let harness = start(&transport);
    let handler = Arc::new(RecordingHandler::default());
    harness.handle.register_handler(handler.clone()).await.unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;

    first.frame(trade_update("new", "o1", "AAPL"));
    first.push(Step::Fail("connection reset".to_string()));

    eventually(|| transport.connects() == 2).await;
    reach(&harness.handle, ConnectionState::Streaming).await;
    second.frame(trade_update("fill", "o1", "AAPL"));
    eventually(|| handler.count() == 2).await;

    assert_eq!(transport.listen_count(), 2);
    assert!(transport.sent().iter().any(|(conn, text)| *conn == 1 && text.contains("listen")));
    let failures = harness.observer.failures.lock().unwrap().clone();
    assert_eq!(failures, vec![("receive".to_string(), 0)]);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refused_connects_back_off_then_recover() {
    let transport = MockTransport::new();
    transport.refuse("connection refused");
    transport.refuse("connection refused");
    transport.accept_authorized();
    let harness = start(&transport);
    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();

    reach(&harness.handle, ConnectionState::Streaming).await;
    let failures = harness.observer.failures.lock().unwrap().clone();
    assert_eq!(
        failures,
        vec![("connect".to_string(), 0), ("connect".to_string(), 1)]
    );

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_backoff() {
    let transport = MockTransport::new();
    transport.refuse("connection refused");
    let harness = start(&transport);
    harness
        .handle
        .register_handler(Arc::new(RecordingHandler::default()))
        .await
        .unwrap();

    eventually(|| !harness.observer.failures.lock().unwrap().is_empty()).await;
    let (transport, _observer, handle) = harness.shutdown().await;

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert_eq!(transport.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_registration_resubscribes_on_live_connection() {
    let transport = MockTransport::new();
    let server = transport.accept_authorized();
    let harness = start(&transport);
    let first = Arc::new(RecordingHandler::default());
    harness.handle.register_handler(first.clone()).await.unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;
    assert_eq!(transport.listen_count(), 1);

    let second = Arc::new(RecordingHandler::default());
    harness.handle.register_handler(second.clone()).await.unwrap();
    assert_eq!(transport.listen_count(), 2);
    assert!(transport.sent().iter().all(|(conn, _)| *conn == 0));

    server.frame(trade_update("new", "o2", "MSFT"));
    eventually(|| second.count() == 1).await;
    assert_eq!(first.count(), 0);

    harness.handle.subscribe().await.unwrap();
    assert_eq!(transport.listen_count(), 3);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_skipped() {
    let transport = MockTransport::new();
    let server = transport.accept_authorized();
    let harness = start(&transport);
    let handler = Arc::new(RecordingHandler::default());
    harness.handle.register_handler(handler.clone()).await.unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;

    server.frame("not json");
    server.frame(r#"{"stream":"trade_updates","data":{"event":"fill"}}"#);
    server.frame(r#"{"stream":"trade_updates","data":{"order":{"id":"x","symbol":"AAPL"}}}"#);
    server.frame(listening());
    server.frame(r#"{"stream":"account_updates","data":{}}"#);
    server.frame(trade_update("new", "o1", "AAPL"));

    eventually(|| handler.count() == 1).await;
    assert_eq!(harness.observer.malformed.load(Ordering::SeqCst), 3);
    assert_eq!(
        *harness.observer.subscribed.lock().unwrap(),
        vec![vec!["trade_updates".to_string()]]
    );
    assert_eq!(transport.connects(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_updates_delivered_in_arrival_order() {
    let transport = MockTransport::new();
    let server = transport.accept_authorized();
    let harness = start(&transport);
    let handler = Arc::new(RecordingHandler::default());
    harness.handle.register_handler(handler.clone()).await.unwrap();
    reach(&harness.handle, ConnectionState::Streaming).await;

    for id in ["a", "b", "c", "d"] {
        server.frame(trade_update("new", id, "AAPL"));
    }
    eventually(|| handler.count() == 4).await;
    assert_eq!(handler.order_ids(), vec!["a", "b", "c", "d"]);

    harness.shutdown().await;
}

struct AccountHandler;

#[async_trait]
impl TradeUpdateHandler for AccountHandler {
    fn stream(&self) -> &str {
        "account_updates"
    }

    async fn on_trade_update(&self, _update: TradeUpdate) {}
}

#[tokio::test(start_paused = true)]
async fn test_invalid_handler_rejected() {
    let transport = MockTransport::new();
    let harness = start(&transport);

    let err = harness
        .handle
        .register_handler(Arc::new(AccountHandler))
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::InvalidHandler(_)));

    let (transport, _, _) = harness.shutdown().await;
    assert_eq!(transport.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_registration_from_plain_thread() {
    let transport = MockTransport::new();
    transport.accept_authorized();
    let harness = start(&transport);

    let handle = harness.handle.clone();
    tokio::task::spawn_blocking(move || {
        handle.register_handler_blocking(Arc::new(RecordingHandler::default()))
    })
    .await
    .unwrap()
    .unwrap();

    reach(&harness.handle, ConnectionState::Streaming).await;
    harness.shutdown().await;
}
