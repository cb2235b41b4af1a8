use clap::Parser;
use dotenv::dotenv;

use orderstream::cli::{Cli, Commands, ReplaceCliConfig, StreamCliConfig, SubmitCliConfig};
use orderstream::commands::{run_cancel, run_clock, run_replace, run_stream, run_submit};
use orderstream::exchange::AppEnv;
use orderstream::observability::init_tracing;
use orderstream::orders::OrderId;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from the .env file
    dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.verbose)?;

    match cli.command {
        Commands::Stream {
            paper,
            url,
            recv_timeout_secs,
            health_port,
        } => {
            run_stream(StreamCliConfig {
                env: AppEnv::from_paper_flag(paper),
                url,
                recv_timeout_secs,
                health_port,
            })
            .await?;
        }
        Commands::Submit {
            symbol,
            side,
            asset_class,
            position_intent,
            qty,
            notional,
            order_type,
            tif,
            limit_price,
            stop_price,
            trail_price,
            trail_percent,
            class,
            take_profit,
            stop_loss_stop,
            stop_loss_limit,
            extended_hours,
            paper,
        } => {
            run_submit(SubmitCliConfig {
                symbol,
                side,
                asset_class,
                position_intent,
                qty,
                notional,
                order_type,
                tif,
                limit_price,
                stop_price,
                trail_price,
                trail_percent,
                class,
                take_profit,
                stop_loss_stop,
                stop_loss_limit,
                extended_hours,
                env: AppEnv::from_paper_flag(paper),
            })
            .await?;
        }
        Commands::Clock { paper } => {
            run_clock(paper).await?;
        }
        Commands::Cancel { id, paper } => {
            run_cancel(&id, paper).await?;
        }
        Commands::Replace {
            id,
            qty,
            tif,
            limit_price,
            stop_price,
            trail,
            paper,
        } => {
            run_replace(ReplaceCliConfig {
                id: OrderId::new(id),
                qty,
                tif,
                limit_price,
                stop_price,
                trail,
                env: AppEnv::from_paper_flag(paper),
            })
            .await?;
        }
    }

    Ok(())
}
