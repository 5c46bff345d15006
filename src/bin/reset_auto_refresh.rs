//! Admin CLI: clears a shipment's auto-refresh failure state so the
//! scheduled supervisor picks it back up (base spec §4.1
//! `ResetAutoRefreshFailCount`).

use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use package_tracker::store;

#[derive(Parser, Debug)]
#[command(name = "reset_auto_refresh", about = "Reset a shipment's auto-refresh failure state")]
struct Args {
    /// Tracking number of the shipment to reset.
    #[arg(long)]
    tracking_number: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new().max_connections(5).connect(&database_url).await?;

    let shipment = store::shipments::get_by_tracking_number(&pool, &args.tracking_number)
        .await?
        .ok_or("no shipment with that tracking number")?;

    store::shipments::reset_auto_refresh_fail_count(&pool, shipment.id).await?;

    writeln!(
        io::stdout(),
        "Reset auto-refresh failure state for shipment {} ({})",
        shipment.id,
        args.tracking_number
    )?;
    Ok(())
}
