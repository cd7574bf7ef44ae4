use anyhow::Context;
use retail_core::app::{app, AppState};
use retail_core::config::config;
use retail_core::database::connect_store;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = config();
    tracing::info!("Starting retail-core in {:?} mode", config.environment);

    let store = connect_store(config.database.url.as_deref()).await?;
    let app = app(AppState::new(store));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    retail_core::database::DatabaseManager::close_all().await;
    Ok(())
}
