//! Stream command handler.
//!
//! Seeds the ledger and position cache from the REST API, then keeps both
//! in sync from the trade-update stream until Ctrl-C.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::StreamCliConfig;
use crate::exchange::alpaca::AlpacaClient;
use crate::exchange::ExchangeConfig;
use crate::health::{run_health_server, HealthContext};
use crate::orders::{OrderDesk, OrderLedger, OrderReconciler};
use crate::portfolio::PositionBook;
use crate::stream::{ConnectionManager, WsTransport};

/// Run the trade-update stream.
///
/// # Errors
/// Returns error if configuration is invalid or the initial order load fails.
/// Connection failures after start-up are retried, not returned.
pub async fn run_stream(config: StreamCliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let exchange = ExchangeConfig::from_env(config.env)?;
    let stream_config = config.stream_config(&exchange)?;
    stream_config.validate()?;

    info!("--- orderstream: Trade Update Stream ---");
    info!(env = %config.env, endpoint = %stream_config.endpoint, "Configuration loaded");

    let client = Arc::new(AlpacaClient::from_config(&exchange)?);
    let ledger = OrderLedger::new();

    let desk = OrderDesk::new(client.clone(), ledger.clone());
    desk.load_open_orders().await?;

    let book = Arc::new(PositionBook::new(client));
    if let Err(e) = book.load_all().await {
        warn!(error = %e, "Starting without cached positions");
    }

    let reconciler = Arc::new(OrderReconciler::new(ledger.clone(), book.clone()));
    let mut manager = ConnectionManager::new(WsTransport::new(), stream_config);
    manager.register_handler(reconciler).await?;
    let handle = manager.handle();

    if let Some(port) = config.health_port {
        let context = HealthContext::new(handle.clone(), ledger.clone());
        tokio::spawn(run_health_server(port, context));
    }

    let stream_task = tokio::spawn(async move { manager.run().await });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping stream");
    handle.stop();
    stream_task.await?;

    info!(
        open_orders = ledger.len().await,
        positions = book.len(),
        "Stream stopped"
    );
    Ok(())
}
