//! Integration tests for the infrastructure components
//!
//! These run against the PostgreSQL and Redis instances named by
//! `DATABASE_URL` and `REDIS_URL`: `cargo test -- --ignored`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    role::Role,
    session::{self, SessionConfig, SessionTokens},
};
use sqlx::Row;
use uuid::Uuid;

/// Migrations apply cleanly and leave the expected tables behind
#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_migrations_create_schema() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    run_migrations(&pool).await?;

    for table in [
        "users",
        "categories",
        "products",
        "product_variants",
        "shopping_carts",
        "cart_items",
        "orders",
        "order_items",
    ] {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(format!("public.{}", table))
            .fetch_one(&pool)
            .await?;
        let present: bool = row.get("present");
        assert!(present, "table {} missing after migrations", table);
    }

    Ok(())
}

/// A revoked token is visible to every service sharing the Redis instance
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_session_revocation_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    assert!(redis_pool.health_check().await?, "Redis health check failed");

    let tokens = SessionTokens::new(&SessionConfig {
        secret: "integration-secret".to_string(),
        ttl_seconds: 30,
    });
    let token = tokens.issue(Uuid::new_v4(), Role::Customer)?;
    let claims = tokens.verify(&token)?;

    assert!(!session::is_revoked(&redis_pool, &token).await?);
    session::revoke(&redis_pool, &token, &claims).await?;
    assert!(session::is_revoked(&redis_pool, &token).await?);

    Ok(())
}
