//! Replace command handler.

use tracing::info;

use crate::cli::ReplaceCliConfig;

/// Replace an open order and print the replacement.
///
/// The open orders are loaded first so the replace can be checked against
/// the current order type.
pub async fn run_replace(config: ReplaceCliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let desk = super::build_desk(config.env)?;
    let open = desk.load_open_orders().await?;
    info!(open_orders = open, order_id = %config.id, "Replacing order");

    let replacement = desk.replace(&config.id, config.to_request()).await?;

    println!("{}", serde_json::to_string_pretty(&replacement)?);
    Ok(())
}
