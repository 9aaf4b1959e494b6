use dotenvy::dotenv;
use shopping_list::config::load_app_configuration;
use shopping_list::errors::Result;
use shopping_list::web::{self, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = load_app_configuration()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;

    // 4. Build shared state and make sure the schema is current
    let state = AppState::new(app_config)?;
    state
        .store
        .prepare()
        .await
        .inspect(|()| info!("Database schema is ready."))
        .inspect_err(|e| error!("Failed to prepare database: {}", e))?;

    // 5. Serve until Ctrl-C
    web::serve(state)
        .await
        .inspect_err(|e| error!("Server stopped with an error: {}", e))?;

    info!("Server shut down cleanly.");
    Ok(())
}
