//! Appends random grocery items to the configured database.
//!
//! Usage: `seed_db [COUNT]` (default 150).

use dotenvy::dotenv;
use shopping_list::config::load_app_configuration;
use shopping_list::core::seed::{DEFAULT_SEED_COUNT, seed_items};
use shopping_list::errors::{Error, Result};
use shopping_list::store::Store;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn requested_count() -> Result<usize> {
    match std::env::args().nth(1) {
        None => Ok(DEFAULT_SEED_COUNT),
        Some(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("item count must be a non-negative integer, got {raw:?}"),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    dotenv().ok();

    let count = requested_count()?;
    let config = load_app_configuration()?;
    let store = Store::new(&config.database_path)?;
    store.prepare().await?;

    let inserted = store
        .scoped(|db| async move { seed_items(&db, count).await })
        .await
        .inspect_err(|e| error!("Seeding failed: {}", e))?;

    info!(database = %config.database_path, "Inserted {} items.", inserted);
    Ok(())
}
