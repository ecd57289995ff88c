use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;

use common::cache::{RedisConfig, RedisPool};
use common::database::{self, DatabaseConfig, init_pool, run_migrations};
use common::session::{SessionConfig, SessionTokens};

pub use crate::state::AppState;
use crate::config::ApiConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = ApiConfig::from_env().context("Invalid API configuration")?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    if !redis_pool.health_check().await? {
        anyhow::bail!("Redis did not answer PING");
    }
    let sessions = SessionTokens::new(&SessionConfig::from_env()?);

    let app_state = AppState::new(
        pool,
        redis_pool,
        sessions,
        config.role_policy(),
        config.cart_max_attempts,
    );

    let origin: HeaderValue = config
        .cors_origin
        .parse()
        .context("STOREFRONT_CORS_ORIGIN is not a valid header value")?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = routes::create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
