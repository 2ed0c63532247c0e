use anyhow::Context;
use price_storage::{StorageCell, StorageConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,price_storage=debug,migration=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StorageConfig::from_env();
    let cell = StorageCell::new(config);

    tracing::info!("Initializing storage...");
    let storage = cell
        .get_instance()
        .await
        .context("database initialization failed")?;

    {
        let mut conn = storage
            .acquire()
            .await
            .context("could not lease a startup connection")?;
        conn.execute("SELECT 1").await?;
    }

    let status = storage.status();
    tracing::info!(
        "Storage on {} with {} open connections ({} idle)",
        storage.profile().connection_url(),
        status.size,
        status.idle
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    storage.shutdown().await;

    Ok(())
}
