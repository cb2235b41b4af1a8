//! Connection manager for the trade-update stream.
//!
//! A single task owns the connection and drives
//! `idle → connecting → authenticating → subscribing → streaming`,
//! falling back to `disconnected` and retrying with backoff whenever a cycle
//! fails. Other threads interact through a [`ConnectionHandle`]: stop
//! requests flip a shared [`StopToken`], registrations and out-of-band
//! subscriptions travel through a bounded mailbox and complete on the loop.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::config::StreamConfig;
use super::control::{ControlCommand, StopToken};
use super::dispatcher::{EventDispatcher, TradeUpdateHandler};
use super::error::{StreamError, TransportError};
use super::protocol::{self, StreamEvent, TRADE_UPDATES};
use super::state::ConnectionState;
use super::transport::{Connection, Transport};
use crate::logging::{StreamObserver, TracingObserver};
use crate::metrics;

/// Handler slot used while no loop is running.
#[derive(Default)]
struct Registration {
    loop_active: bool,
    pending: Option<Arc<dyn TradeUpdateHandler>>,
}

/// State shared between the loop and its handles.
struct Shared {
    stop: StopToken,
    state: watch::Sender<ConnectionState>,
    registration: Mutex<Registration>,
    mailbox: mpsc::Sender<ControlCommand>,
}

impl Shared {
    fn registration(&self) -> MutexGuard<'_, Registration> {
        self.registration.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Thread-safe handle to a [`ConnectionManager`].
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

/// Where a control command ended up.
enum Delivery {
    Done,
    Queued(oneshot::Receiver<()>),
    Backlogged(ControlCommand, oneshot::Receiver<()>),
}

impl ConnectionHandle {
    /// Register the trade-update handler.
    ///
    /// Fails fast with [`StreamError::InvalidHandler`] when the handler
    /// targets a stream this client cannot subscribe to. While the loop is
    /// running the handler is installed on the loop, which also subscribes
    /// immediately when already streaming; this call returns once that is done.
    pub async fn register_handler(
        &self,
        handler: Arc<dyn TradeUpdateHandler>,
    ) -> Result<(), StreamError> {
        EventDispatcher::validate(handler.as_ref())?;
        let delivery = self.deliver(
            |ack| ControlCommand::Register { handler, ack },
            |registration, command| {
                if let ControlCommand::Register { handler, .. } = command {
                    registration.pending = Some(handler);
                }
            },
        )?;
        self.complete(delivery).await
    }

    /// Blocking variant of [`register_handler`](Self::register_handler) for
    /// callers on plain threads. Must not be called from async context.
    pub fn register_handler_blocking(
        &self,
        handler: Arc<dyn TradeUpdateHandler>,
    ) -> Result<(), StreamError> {
        EventDispatcher::validate(handler.as_ref())?;
        let delivery = self.deliver(
            |ack| ControlCommand::Register { handler, ack },
            |registration, command| {
                if let ControlCommand::Register { handler, .. } = command {
                    registration.pending = Some(handler);
                }
            },
        )?;
        match delivery {
            Delivery::Done => Ok(()),
            Delivery::Queued(ack) => ack.blocking_recv().map_err(|_| StreamError::LoopClosed),
            Delivery::Backlogged(command, ack) => {
                self.shared
                    .mailbox
                    .blocking_send(command)
                    .map_err(|_| StreamError::LoopClosed)?;
                ack.blocking_recv().map_err(|_| StreamError::LoopClosed)
            }
        }
    }

    /// Ask the loop to re-send the subscription on the live connection.
    /// A no-op when not streaming; the next connection subscribes anyway.
    pub async fn subscribe(&self) -> Result<(), StreamError> {
        let delivery = self.deliver(|ack| ControlCommand::Subscribe { ack }, |_, _| {})?;
        self.complete(delivery).await
    }

    /// Request a graceful stop. Idempotent and callable from any thread.
    pub fn stop(&self) {
        if self.shared.stop.stop() {
            info!("Stop requested for trade update stream");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.is_stopped()
    }

    /// True while a live connection is streaming.
    pub fn is_running(&self) -> bool {
        self.state() == ConnectionState::Streaming
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the connection reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Route a command: into the pending slot when no loop runs, otherwise
    /// into the mailbox. The decision and the enqueue happen under the
    /// registration lock so the loop cannot start or exit in between.
    fn deliver(
        &self,
        make: impl FnOnce(oneshot::Sender<()>) -> ControlCommand,
        park: impl FnOnce(&mut Registration, ControlCommand),
    ) -> Result<Delivery, StreamError> {
        let (ack, ack_rx) = oneshot::channel();
        let command = make(ack);
        let mut registration = self.shared.registration();
        if !registration.loop_active {
            debug!(command = command.name(), "Loop not running, keeping command for next run");
            park(&mut registration, command);
            return Ok(Delivery::Done);
        }
        match self.shared.mailbox.try_send(command) {
            Ok(()) => Ok(Delivery::Queued(ack_rx)),
            Err(TrySendError::Full(command)) => Ok(Delivery::Backlogged(command, ack_rx)),
            Err(TrySendError::Closed(_)) => Err(StreamError::LoopClosed),
        }
    }

    async fn complete(&self, delivery: Delivery) -> Result<(), StreamError> {
        match delivery {
            Delivery::Done => Ok(()),
            Delivery::Queued(ack) => ack.await.map_err(|_| StreamError::LoopClosed),
            Delivery::Backlogged(command, ack) => {
                self.shared
                    .mailbox
                    .send(command)
                    .await
                    .map_err(|_| StreamError::LoopClosed)?;
                ack.await.map_err(|_| StreamError::LoopClosed)
            }
        }
    }
}

/// How a streaming session ended.
enum SessionEnd {
    Stopped,
    Failed(StreamError),
}

/// Owns the transport lifecycle of the trade-update stream.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: StreamConfig,
    observer: Arc<dyn StreamObserver>,
    shared: Arc<Shared>,
    mailbox: mpsc::Receiver<ControlCommand>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: StreamConfig) -> Self {
        Self::with_observer(transport, config, Arc::new(TracingObserver::new()))
    }

    pub fn with_observer(
        transport: T,
        config: StreamConfig,
        observer: Arc<dyn StreamObserver>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.control_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            transport,
            config,
            observer,
            shared: Arc::new(Shared {
                stop: StopToken::new(),
                state,
                registration: Mutex::new(Registration::default()),
                mailbox: tx,
            }),
            mailbox: rx,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub async fn register_handler(
        &self,
        handler: Arc<dyn TradeUpdateHandler>,
    ) -> Result<(), StreamError> {
        self.handle().register_handler(handler).await
    }

    pub fn stop(&self) {
        self.handle().stop()
    }

    pub fn is_running(&self) -> bool {
        self.handle().is_running()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle().state()
    }

    /// Drive the connection until a stop is requested.
    ///
    /// Transport and authentication failures are retried internally; this
    /// only returns once the stop has been observed.
    pub async fn run(&mut self) {
        let mut dispatcher = EventDispatcher::new();
        self.activate(&mut dispatcher);

        info!(endpoint = %self.config.endpoint, "Trade update stream starting");
        if self.wait_for_handler(&mut dispatcher).await {
            self.drive(&mut dispatcher).await;
        } else {
            info!("Stopped before a handler was registered");
        }

        self.deactivate(&mut dispatcher).await;
        info!(state = %self.state(), "Trade update stream stopped");
    }

    /// Run on a dedicated Tokio runtime, blocking the calling thread.
    pub fn run_blocking(&mut self) -> std::io::Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run());
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.shared.state.send_replace(next);
        if previous != next {
            metrics::set_connection_state(next.as_str(), &ConnectionState::labels());
            self.observer.on_state_change(previous, next);
        }
    }

    fn activate(&self, dispatcher: &mut EventDispatcher) {
        let mut registration = self.shared.registration();
        registration.loop_active = true;
        if let Some(handler) = registration.pending.take() {
            if let Err(e) = dispatcher.set_handler(handler) {
                warn!(error = %e, "Discarding invalid pending handler");
            }
        }
    }

    /// Hand the handler back to the pending slot and settle any commands
    /// still queued, so nothing waits on a loop that is gone.
    async fn deactivate(&mut self, dispatcher: &mut EventDispatcher) {
        let leftovers = {
            let mut registration = self.shared.registration();
            registration.loop_active = false;
            let mut leftovers = Vec::new();
            while let Ok(command) = self.mailbox.try_recv() {
                leftovers.push(command);
            }
            for command in &mut leftovers {
                if let ControlCommand::Register { handler, .. } = command {
                    registration.pending = Some(Arc::clone(handler));
                }
            }
            if registration.pending.is_none() {
                registration.pending = dispatcher.take_handler();
            }
            leftovers
        };
        for command in leftovers {
            match command {
                ControlCommand::Register { ack, .. } | ControlCommand::Subscribe { ack } => {
                    let _ = ack.send(());
                }
            }
        }
    }

    /// Block until a handler is installed. Returns false if stopped first.
    async fn wait_for_handler(&mut self, dispatcher: &mut EventDispatcher) -> bool {
        while !dispatcher.has_handler() {
            if self.shared.stop.is_stopped() {
                return false;
            }
            debug!("Waiting for a trade update handler before connecting");
            tokio::select! {
                _ = self.shared.stop.stopped() => return false,
                Some(command) = self.mailbox.recv() => {
                    let _ = self.apply_command(command, dispatcher, None).await;
                }
            }
        }
        !self.shared.stop.is_stopped()
    }

    /// Connection cycles until stopped.
    async fn drive(&mut self, dispatcher: &mut EventDispatcher) {
        let mut attempt: u32 = 0;

        loop {
            if self.shared.stop.is_stopped() {
                break;
            }

            let failure = match self.open_session().await {
                Ok(mut conn) => {
                    attempt = 0;
                    match self.stream_session(&mut conn, dispatcher).await {
                        SessionEnd::Stopped => {
                            self.set_state(ConnectionState::Closing);
                            if let Err(e) = conn.close().await {
                                debug!(error = %e, "Error while closing stream connection");
                            }
                            self.set_state(ConnectionState::Disconnected);
                            break;
                        }
                        SessionEnd::Failed(error) => {
                            // Best effort; the remote may already be gone.
                            let _ = conn.close().await;
                            error
                        }
                    }
                }
                Err(error) => error,
            };

            self.set_state(ConnectionState::Disconnected);
            metrics::record_reconnection(failure.kind());
            let delay = self.config.reconnect.delay_for(attempt);
            self.observer.on_connection_failure(&failure, attempt, delay);
            attempt = attempt.saturating_add(1);

            if !self.pause(delay, dispatcher).await {
                break;
            }
        }
    }

    /// Connect, authenticate and subscribe.
    async fn open_session(&self) -> Result<T::Connection, StreamError> {
        self.set_state(ConnectionState::Connecting);
        let mut conn = match timeout(
            self.config.connect_timeout,
            self.transport.connect(&self.config.endpoint),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout("connect").into()),
        };

        self.set_state(ConnectionState::Authenticating);
        if let Err(e) = self.authenticate(&mut conn).await {
            let _ = conn.close().await;
            return Err(e);
        }

        self.set_state(ConnectionState::Subscribing);
        if let Err(e) = conn.send(protocol::listen_frame(&[TRADE_UPDATES])).await {
            let _ = conn.close().await;
            return Err(e.into());
        }

        Ok(conn)
    }

    async fn authenticate(&self, conn: &mut T::Connection) -> Result<(), StreamError> {
        conn.send(protocol::auth_frame(
            &self.config.key_id,
            &self.config.secret_key,
        ))
        .await?;

        let deadline = Instant::now() + self.config.recv_timeout;
        loop {
            let frame = match tokio::time::timeout_at(deadline, conn.recv()).await {
                Ok(received) => received?,
                Err(_) => return Err(TransportError::Timeout("authorization").into()),
            };
            let Some(text) = frame else {
                return Err(TransportError::Closed("during authentication".to_string()).into());
            };

            match protocol::decode_frame(&text) {
                Ok(StreamEvent::AuthResult(result)) if result.is_authorized() => {
                    info!("Trade update stream authenticated");
                    return Ok(());
                }
                Ok(StreamEvent::AuthResult(result)) => {
                    return Err(StreamError::Authentication(format!(
                        "server replied with status '{}'",
                        result.status
                    )));
                }
                Ok(other) => {
                    debug!(stream = ?other.stream(), "Ignoring frame while authenticating");
                }
                Err(e) => {
                    metrics::record_malformed(e.kind());
                    self.observer.on_malformed(&e, &text);
                }
            }
        }
    }

    /// Consume frames until stopped or the transport fails.
    async fn stream_session(
        &mut self,
        conn: &mut T::Connection,
        dispatcher: &mut EventDispatcher,
    ) -> SessionEnd {
        self.set_state(ConnectionState::Streaming);
        let recv_timeout = self.config.recv_timeout;

        loop {
            if self.shared.stop.is_stopped() {
                return SessionEnd::Stopped;
            }

            tokio::select! {
                biased;
                _ = self.shared.stop.stopped() => return SessionEnd::Stopped,
                Some(command) = self.mailbox.recv() => {
                    if let Err(e) = self.apply_command(command, dispatcher, Some(&mut *conn)).await {
                        return SessionEnd::Failed(e);
                    }
                }
                received = timeout(recv_timeout, conn.recv()) => match received {
                    Err(_) => self.observer.on_idle(recv_timeout),
                    Ok(Ok(Some(text))) => self.handle_frame(&text, dispatcher).await,
                    Ok(Ok(None)) => {
                        return SessionEnd::Failed(
                            TransportError::Closed("stream ended".to_string()).into(),
                        )
                    }
                    Ok(Err(e)) => return SessionEnd::Failed(e.into()),
                },
            }
        }
    }

    async fn handle_frame(&self, text: &str, dispatcher: &EventDispatcher) {
        let event = match protocol::decode_frame(text) {
            Ok(event) => event,
            Err(e) => {
                metrics::record_malformed(e.kind());
                self.observer.on_malformed(&e, text);
                return;
            }
        };
        metrics::record_frame(event.stream().unwrap_or("none"));

        match event {
            StreamEvent::SubscriptionAck { streams } => self.observer.on_subscribed(&streams),
            StreamEvent::AuthResult(result) => {
                debug!(status = %result.status, "Ignoring late authorization frame");
            }
            event => {
                dispatcher.dispatch(event).await;
            }
        }
    }

    /// Sleep for `delay`, still serving the mailbox. Returns false if stopped.
    async fn pause(&mut self, delay: Duration, dispatcher: &mut EventDispatcher) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = self.shared.stop.stopped() => return false,
                _ = &mut sleep => return true,
                Some(command) = self.mailbox.recv() => {
                    let _ = self.apply_command(command, dispatcher, None).await;
                }
            }
        }
    }

    /// Execute a control command on the loop and acknowledge it.
    async fn apply_command(
        &self,
        command: ControlCommand,
        dispatcher: &mut EventDispatcher,
        conn: Option<&mut T::Connection>,
    ) -> Result<(), StreamError> {
        let (ack, result) = match command {
            ControlCommand::Register { handler, ack } => {
                let installed = dispatcher.set_handler(handler);
                let result = match (installed, conn) {
                    (Ok(()), Some(conn)) => {
                        info!("Handler registered while streaming, subscribing");
                        conn.send(protocol::listen_frame(&[TRADE_UPDATES]))
                            .await
                            .map_err(StreamError::from)
                    }
                    (Ok(()), None) => {
                        debug!("Handler registered");
                        Ok(())
                    }
                    (Err(e), _) => {
                        warn!(error = %e, "Rejected handler on loop");
                        Ok(())
                    }
                };
                (ack, result)
            }
            ControlCommand::Subscribe { ack } => {
                let result = match conn {
                    Some(conn) => conn
                        .send(protocol::listen_frame(&[TRADE_UPDATES]))
                        .await
                        .map_err(StreamError::from),
                    None => Ok(()),
                };
                (ack, result)
            }
        };
        let _ = ack.send(());
        result
    }
}
