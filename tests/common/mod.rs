//! Scripted in-memory transport and recording collaborators for stream tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use orderstream::logging::StreamObserver;
use orderstream::stream::{
    Connection, ConnectionState, ReconnectPolicy, StreamConfig, StreamError, TradeUpdate,
    TradeUpdateHandler, Transport, TransportError,
};

/// One scripted server-side action for a connection.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(String),
    /// Remote closes the connection
    Close,
    /// Receive fails with a transport error
    Fail(String),
}

/// Test-side control of one accepted connection.
#[derive(Clone)]
pub struct ServerSide {
    tx: mpsc::UnboundedSender<Step>,
}

impl ServerSide {
    pub fn push(&self, step: Step) {
        let _ = self.tx.send(step);
    }

    pub fn frame(&self, text: impl Into<String>) {
        self.push(Step::Frame(text.into()));
    }
}

enum Planned {
    Accept(mpsc::UnboundedReceiver<Step>),
    Refuse(String),
}

#[derive(Default)]
struct Recorder {
    planned: Mutex<VecDeque<Planned>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    sent: Mutex<Vec<(usize, String)>>,
}

/// Transport whose connections replay scripted steps.
///
/// Each `connect` consumes the next planned session; with none left it is
/// refused. A session whose script runs dry stays open and silent.
#[derive(Clone, Default)]
pub struct MockTransport {
    recorder: Arc<Recorder>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan an accepted connection and return its server side.
    pub fn accept(&self) -> ServerSide {
        let (tx, rx) = mpsc::unbounded_channel();
        self.recorder
            .planned
            .lock()
            .unwrap()
            .push_back(Planned::Accept(rx));
        ServerSide { tx }
    }

    /// Plan an accepted connection that authorizes immediately.
    pub fn accept_authorized(&self) -> ServerSide {
        let server = self.accept();
        server.frame(auth_ok());
        server
    }

    pub fn refuse(&self, reason: &str) {
        self.recorder
            .planned
            .lock()
            .unwrap()
            .push_back(Planned::Refuse(reason.to_string()));
    }

    pub fn connects(&self) -> usize {
        self.recorder.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(usize, String)> {
        self.recorder.sent.lock().unwrap().clone()
    }

    /// Listen frames sent, across all connections.
    pub fn listen_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|(_, text)| text.contains("\"listen\""))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn connect(&self, _endpoint: &str) -> Result<MockConnection, TransportError> {
        let index = self.recorder.connects.fetch_add(1, Ordering::SeqCst);
        let planned = self.recorder.planned.lock().unwrap().pop_front();
        match planned {
            Some(Planned::Accept(rx)) => Ok(MockConnection {
                index,
                rx,
                recorder: Arc::clone(&self.recorder),
                closed: false,
            }),
            Some(Planned::Refuse(reason)) => Err(TransportError::Connect(reason)),
            None => Err(TransportError::Connect("no session planned".to_string())),
        }
    }
}

pub struct MockConnection {
    index: usize,
    rx: mpsc::UnboundedReceiver<Step>,
    recorder: Arc<Recorder>,
    closed: bool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send("connection closed".to_string()));
        }
        self.recorder.sent.lock().unwrap().push((self.index, text));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.rx.recv().await {
            Some(Step::Frame(text)) => Ok(Some(text)),
            Some(Step::Close) => Ok(None),
            Some(Step::Fail(reason)) => Err(TransportError::Receive(reason)),
            // Every server side dropped: the remote went away.
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observer that records what the loop reported.
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(ConnectionState, ConnectionState)>>,
    pub failures: Mutex<Vec<(String, u32)>>,
    pub malformed: AtomicUsize,
    pub idle: AtomicUsize,
    pub subscribed: Mutex<Vec<Vec<String>>>,
}

impl RecordingObserver {
    pub fn states_entered(&self) -> Vec<ConnectionState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, to)| *to)
            .collect()
    }

    pub fn failure_kinds(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .map(|(kind, _)| kind.clone())
            .collect()
    }
}

impl StreamObserver for RecordingObserver {
    fn on_state_change(&self, from: ConnectionState, to: ConnectionState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_connection_failure(&self, error: &StreamError, attempt: u32, _retry_in: Duration) {
        self.failures
            .lock()
            .unwrap()
            .push((error.kind().to_string(), attempt));
    }

    fn on_idle(&self, _waited: Duration) {
        self.idle.fetch_add(1, Ordering::SeqCst);
    }

    fn on_malformed(&self, _error: &StreamError, _frame: &str) {
        self.malformed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_subscribed(&self, streams: &[String]) {
        self.subscribed.lock().unwrap().push(streams.to_vec());
    }
}

/// Handler that keeps every update it receives.
#[derive(Default)]
pub struct RecordingHandler {
    pub updates: Mutex<Vec<TradeUpdate>>,
}

impl RecordingHandler {
    pub fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn order_ids(&self) -> Vec<String> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.order.id.to_string())
            .collect()
    }
}

#[async_trait]
impl TradeUpdateHandler for RecordingHandler {
    async fn on_trade_update(&self, update: TradeUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

pub fn test_config() -> StreamConfig {
    StreamConfig::new("wss://stream.test/stream", "key", "secret")
        .with_recv_timeout(Duration::from_secs(1))
        .with_connect_timeout(Duration::from_secs(1))
        .with_reconnect_policy(ReconnectPolicy::fixed(Duration::from_millis(50)))
}

pub fn auth_ok() -> String {
    json!({"stream": "authorization", "data": {"status": "authorized", "action": "authenticate"}})
        .to_string()
}

pub fn auth_denied() -> String {
    json!({"stream": "authorization", "data": {"status": "unauthorized", "action": "authenticate"}})
        .to_string()
}

pub fn listening() -> String {
    json!({"stream": "listening", "data": {"streams": ["trade_updates"]}}).to_string()
}

pub fn trade_update(event: &str, id: &str, symbol: &str) -> String {
    json!({
        "stream": "trade_updates",
        "data": {
            "event": event,
            "order": {
                "id": id,
                "symbol": symbol,
                "side": "buy",
                "type": "limit",
                "qty": "10",
                "filled_qty": "0",
                "limit_price": "100",
                "status": "new"
            }
        }
    })
    .to_string()
}

/// Poll `condition` on the paused clock until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Async variant of [`eventually`] for conditions that must await.
pub async fn eventually_async<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..2_000 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
