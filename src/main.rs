use anyhow::Context;
use tracing_subscriber::EnvFilter;

use admin_api::{app, config, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("admin_api=debug,tower_http=info")),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting Admin API in {:?} mode", config.environment);

    if admin_api::is_development!() && std::env::var("JWT_SECRET").is_err() {
        tracing::warn!("Using the built-in development JWT secret; set JWT_SECRET to override");
    }
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store = database::open_store(&config.database)
        .await
        .context("failed to open store")?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Admin API listening on http://{}", bind_addr);

    axum::serve(listener, app(store)).await.context("server error")?;
    Ok(())
}
