use anyhow::Context;
use tracing_subscriber::EnvFilter;

use natours_api::config::config;
use natours_api::database::DatabaseManager;
use natours_api::services::email;
use natours_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    // Initialize configuration (this loads the config singleton)
    let config = config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .init();
    tracing::info!("Starting Natours API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }

    let pool = DatabaseManager::connect_lazy().context("failed to create database pool")?;
    if config.database.run_migrations {
        DatabaseManager::run_migrations(&pool)
            .await
            .context("failed to apply migrations")?;
    }

    let state = AppState {
        pool,
        mailer: email::from_config(&config.email),
    };

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Natours API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
