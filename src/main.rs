//! ContentKosh - content management backend

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contentkosh::{
    api::{self, AppState},
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contentkosh=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ContentKosh...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");
    if config.uses_default_secret() {
        tracing::warn!("auth.jwt_secret is the built-in development secret; set CONTENTKOSH_JWT_SECRET in production");
    }
    if config.auth.expose_reset_token {
        tracing::warn!("auth.expose_reset_token is enabled; reset tokens are returned in API responses");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let state = AppState::new(pool, &config);
    if config.mail.is_enabled() {
        tracing::info!("SMTP mail enabled for password resets");
    } else {
        tracing::info!("SMTP not configured; reset tokens will be logged");
    }

    // Initial accounts
    state
        .user_service
        .seed_defaults(&config.seed)
        .await
        .context("Failed to seed default accounts")?;

    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
