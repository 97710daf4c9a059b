//! SkillSwap backend server binary.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skillswap_backend::config::{Config, PersistenceMode};
use skillswap_backend::db::{self, MemoryRepository, Repository, SqliteRepository};
use skillswap_backend::realtime::Hub;
use skillswap_backend::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SkillSwap Backend");
    tracing::info!("Persistence: {:?}", config.persistence);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (SKILLSWAP_API_PSK). Authentication is disabled!");
    }

    // Initialize the configured repository
    let repo = match config.persistence {
        PersistenceMode::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = db::init_database(&config.db_path).await?;
            Arc::new(Repository::Sqlite(SqliteRepository::new(pool)))
        }
        PersistenceMode::Memory => Arc::new(Repository::Memory(MemoryRepository::new())),
    };

    // Create application state
    let state = AppState {
        repo,
        hub: Arc::new(Hub::new()),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
