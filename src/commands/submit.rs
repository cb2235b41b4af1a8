//! Submit command handler.

use tracing::info;

use crate::cli::SubmitCliConfig;

/// Validate and submit one order, printing the broker's snapshot.
///
/// # Errors
/// Returns error if the request is invalid or the broker rejects it.
pub async fn run_submit(config: SubmitCliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let request = config.to_request()?;
    request.validate()?;

    info!(
        symbol = %request.symbol,
        side = %request.side,
        order_type = %request.order_type,
        env = %config.env,
        "Submitting order"
    );

    let desk = super::build_desk(config.env)?;
    let order = desk.submit(&request).await?;

    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}
