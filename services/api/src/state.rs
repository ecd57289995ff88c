//! Application state shared across handlers

use common::cache::RedisPool;
use common::role::RolePolicy;
use common::session::SessionTokens;
use sqlx::PgPool;

use crate::repositories::{
    UserRepository, cart::CartRepository, catalog::CategoryRepository,
    catalog::ProductRepository, order::OrderRepository, stats::StatsRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redis_pool: RedisPool,
    pub sessions: SessionTokens,
    pub role_policy: RolePolicy,
    pub user_repository: UserRepository,
    pub category_repository: CategoryRepository,
    pub product_repository: ProductRepository,
    pub cart_repository: CartRepository,
    pub order_repository: OrderRepository,
    pub stats_repository: StatsRepository,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        redis_pool: RedisPool,
        sessions: SessionTokens,
        role_policy: RolePolicy,
        cart_max_attempts: u32,
    ) -> Self {
        Self {
            user_repository: UserRepository::new(db_pool.clone()),
            category_repository: CategoryRepository::new(db_pool.clone()),
            product_repository: ProductRepository::new(db_pool.clone()),
            cart_repository: CartRepository::new(db_pool.clone(), cart_max_attempts),
            order_repository: OrderRepository::new(db_pool.clone()),
            stats_repository: StatsRepository::new(db_pool),
            redis_pool,
            sessions,
            role_policy,
        }
    }
}
