//! Maintenance binary: delete abandoned assignments.
//!
//! Intended to run from cron or a systemd timer. Connects, sweeps once,
//! logs the deleted count, and exits.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expire_assignments=info,piecework_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = piecework_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;

    let started = std::time::Instant::now();
    let deleted = piecework_db::allocation::expire_abandoned(&pool)
        .await
        .context("Expiry sweep failed")?;
    tracing::info!(deleted, elapsed_ms = started.elapsed().as_millis() as u64, "Expiry sweep finished");
    Ok(())
}
