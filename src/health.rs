//! Health check HTTP endpoint for monitoring

use crate::metrics;
use crate::orders::OrderLedger;
use crate::stream::{ConnectionHandle, ConnectionState};
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String, // "healthy", "degraded", "critical"
    pub version: String,
    pub connection_state: String,
    pub open_orders: usize,
    pub uptime_seconds: u64,
    pub timestamp: i64,
}

/// Map the connection state onto an overall status.
pub fn status_for(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Streaming => "healthy",
        ConnectionState::Idle
        | ConnectionState::Connecting
        | ConnectionState::Authenticating
        | ConnectionState::Subscribing => "degraded",
        ConnectionState::Closing | ConnectionState::Disconnected => "critical",
    }
}

/// What the health endpoint reads on each request.
#[derive(Clone)]
pub struct HealthContext {
    handle: ConnectionHandle,
    ledger: OrderLedger,
    started: Instant,
}

impl HealthContext {
    pub fn new(handle: ConnectionHandle, ledger: OrderLedger) -> Self {
        Self {
            handle,
            ledger,
            started: Instant::now(),
        }
    }

    pub async fn report(&self) -> HealthResponse {
        let state = self.handle.state();
        HealthResponse {
            status: status_for(state).to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connection_state: state.to_string(),
            open_orders: self.ledger.len().await,
            uptime_seconds: self.started.elapsed().as_secs(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

async fn health_check(State(context): State<Arc<HealthContext>>) -> Json<HealthResponse> {
    Json(context.report().await)
}

/// Prometheus metrics endpoint
async fn metrics_endpoint() -> String {
    metrics::gather_metrics()
}

pub fn router(context: HealthContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(Arc::new(context))
}

pub async fn run_health_server(port: u16, context: HealthContext) {
    let app = router(context);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Health check server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(
                "Health server failed to bind to {}: {}. Streaming continues without health endpoint.",
                addr,
                e
            );
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Health check server failed: {}", e);
    }
}
