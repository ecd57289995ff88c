use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod validation;

use common::cache::{RedisConfig, RedisPool};
use common::database::{self, DatabaseConfig, init_pool};
use common::role::RolePolicy;
use common::session::{SessionConfig, SessionTokens};

use crate::{config::AuthConfig, rate_limiter::RateLimiter, repositories::UserRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redis_pool: RedisPool,
    pub sessions: SessionTokens,
    pub user_repository: UserRepository,
    pub rate_limiter: RateLimiter,
    pub role_policy: RolePolicy,
    pub config: AuthConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let config = AuthConfig::from_env().context("Invalid auth configuration")?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    if !redis_pool.health_check().await? {
        anyhow::bail!("Redis did not answer PING");
    }
    let sessions = SessionTokens::new(&SessionConfig::from_env()?);

    let app_state = AppState {
        redis_pool,
        sessions,
        user_repository: UserRepository::new(pool),
        rate_limiter: RateLimiter::new(config.rate_limiter()),
        role_policy: config.role_policy(),
        config: config.clone(),
    };

    let origin: HeaderValue = config
        .cors_origin
        .parse()
        .context("STOREFRONT_AUTH_CORS_ORIGIN is not a valid header value")?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = routes::create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
