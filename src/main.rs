use anyhow::Result;

use stayqa_backend::auth::TokenVerifier;
use stayqa_backend::services::{Mailer, RedisCache};
use stayqa_backend::{app, config, db, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting StayQA backend"
    );

    // Create database pool
    let pool = db::create_pool(&settings).await?;

    // Create Redis cache
    let cache = RedisCache::new(&settings.redis_url, settings.redis_cache_ttl_seconds).await?;
    tracing::info!("Redis cache initialized");

    // Token verifier (dev bypass and bootstrap live behind auth construction)
    let verifier = TokenVerifier::from_settings(&settings);

    // Mail client is optional; assignment emails are skipped when unset
    let mailer = Mailer::from_settings(&settings)?;

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), verifier, cache, mailer);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
