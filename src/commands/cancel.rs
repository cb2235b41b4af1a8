//! Cancel command handler.

use crate::exchange::AppEnv;
use crate::orders::OrderId;

/// Ask the broker to cancel `id`. The cancel is confirmed on the stream.
pub async fn run_cancel(id: &str, paper: bool) -> Result<(), Box<dyn std::error::Error>> {
    let desk = super::build_desk(AppEnv::from_paper_flag(paper))?;
    desk.cancel(&OrderId::new(id)).await?;
    println!("Cancel requested for {}", id);
    Ok(())
}
