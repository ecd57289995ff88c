//! Store-wide aggregates for admins

use sqlx::{PgPool, Row};

use crate::error::StoreError;
use crate::models::round_money;
use crate::models::stats::AdminStats;

#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All counters come from one statement and therefore one snapshot
    pub async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COUNT(*) FROM products WHERE NOT deleted) AS total_products,
                (SELECT COUNT(*) FROM users WHERE role = 'customer') AS total_customers,
                (SELECT COUNT(*) FROM categories) AS total_categories,
                (SELECT COALESCE(SUM(total_price), 0) FROM orders) AS total_revenue
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminStats {
            total_orders: row.try_get("total_orders")?,
            total_products: row.try_get("total_products")?,
            total_customers: row.try_get("total_customers")?,
            total_categories: row.try_get("total_categories")?,
            total_revenue: round_money(row.try_get("total_revenue")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::cart::fixtures::seed;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    #[ignore = "requires PostgreSQL"]
    async fn test_counts_include_new_customer_and_product() {
        let pool = crate::repositories::test_pool().await;
        let stats = StatsRepository::new(pool.clone());

        let before = stats.admin_stats().await.unwrap();
        seed(&pool, 1000, 5).await;
        let after = stats.admin_stats().await.unwrap();

        assert!(after.total_customers >= before.total_customers + 1);
        assert!(after.total_products >= before.total_products + 1);
        assert!(after.total_categories >= before.total_categories + 1);
    }
}
