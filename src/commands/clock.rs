//! Clock command handler.

use crate::exchange::alpaca::AlpacaClient;
use crate::exchange::{AppEnv, ExchangeConfig};

/// Print the market session state, all times in UTC.
pub async fn run_clock(paper: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = ExchangeConfig::from_env(AppEnv::from_paper_flag(paper))?;
    let client = AlpacaClient::from_config(&config)?;
    let clock = client.clock().await?;

    println!("Market open: {}", clock.is_open);
    println!("As of:       {}", clock.timestamp.to_rfc3339());
    println!("Next open:   {}", clock.next_open.to_rfc3339());
    println!("Next close:  {}", clock.next_close.to_rfc3339());
    println!(
        "Next change in {} minutes",
        clock.until_next_change().num_minutes()
    );
    Ok(())
}
