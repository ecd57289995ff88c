//! Cart repository
//!
//! Every mutation locks the caller's `shopping_carts` row first, so two
//! requests from the same user are applied one after the other. The add
//! path also locks the variant row it checks stock against.

use common::error::sqlstate;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::retry::retry_on_conflict;
use crate::error::StoreError;
use crate::models::cart::{
    AddCartItem, CartItemView, CartLine, CartMutation, CartStats, CartView, LineProduct,
    LineVariant, NewCartLine, VariantStock, plan_add_item,
};
use crate::models::round_money;

/// Cart repository for database operations
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
    max_attempts: u32,
}

impl CartRepository {
    pub fn new(pool: PgPool, max_attempts: u32) -> Self {
        Self { pool, max_attempts }
    }

    /// Add a product variant to the user's cart, merging with an existing
    /// line for the same product and SKU. Returns the updated cart.
    pub async fn add_or_update_item(
        &self,
        user_id: Uuid,
        item: &AddCartItem,
    ) -> Result<CartView, StoreError> {
        retry_on_conflict(self.max_attempts, || self.try_add_item(user_id, item)).await
    }

    async fn try_add_item(&self, user_id: Uuid, item: &AddCartItem) -> Result<CartView, StoreError> {
        let mut tx = self.pool.begin().await?;

        let cart_id = lock_cart_of(&mut tx, user_id).await?;

        let stock = lock_variant(&mut tx, item.product_id, &item.variant_sku)
            .await?
            .ok_or_else(|| StoreError::ProductNotFound {
                product_id: item.product_id,
                sku: item.variant_sku.clone(),
            })?;

        let lines = match cart_id {
            Some(cart_id) => Some(lines_of(&mut tx, cart_id).await?),
            None => None,
        };

        let mutation = plan_add_item(lines.as_deref(), &stock, item.quantity).inspect_err(|err| {
            warn!(%user_id, sku = %item.variant_sku, quantity = item.quantity, error = %err, "Add to cart rejected");
        })?;

        match (cart_id, mutation) {
            (_, CartMutation::CreateCart(line)) => {
                let cart_id: Uuid = sqlx::query_scalar(
                    "INSERT INTO shopping_carts (user_id) VALUES ($1) RETURNING id",
                )
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::CartPersistenceFailure)?;

                insert_line(&mut tx, cart_id, &line).await?;
                info!(%user_id, %cart_id, sku = %line.variant_sku, quantity = line.quantity, "Cart created");
            }
            (Some(cart_id), CartMutation::MergeLine {
                item_id,
                added_quantity,
                quantity,
                unit_price,
                total_price,
            }) => {
                let merged: Option<i32> = sqlx::query_scalar(
                    r#"
                    UPDATE cart_items
                    SET quantity = quantity + $3,
                        unit_price = $4,
                        total_price = $5
                    WHERE id = $1 AND cart_id = $2
                    RETURNING quantity
                    "#,
                )
                .bind(item_id)
                .bind(cart_id)
                .bind(added_quantity)
                .bind(unit_price)
                .bind(total_price)
                .fetch_optional(&mut *tx)
                .await?;

                if merged != Some(quantity) {
                    error!(%cart_id, %item_id, expected = quantity, actual = ?merged, "Cart line changed under lock");
                    return Err(StoreError::CartPersistenceFailure);
                }
                touch_cart(&mut tx, cart_id).await?;
                info!(%user_id, %cart_id, sku = %item.variant_sku, quantity, "Cart line merged");
            }
            (Some(cart_id), CartMutation::AppendLine(line)) => {
                insert_line(&mut tx, cart_id, &line).await?;
                touch_cart(&mut tx, cart_id).await?;
                info!(%user_id, %cart_id, sku = %line.variant_sku, quantity = line.quantity, "Cart line added");
            }
            (None, _) => return Err(StoreError::CartPersistenceFailure),
        }

        let view = load_cart_view(&mut tx, user_id)
            .await?
            .ok_or(StoreError::CartPersistenceFailure)?;
        tx.commit().await?;

        Ok(view)
    }

    /// The user's cart; `None` when there is no cart or it has no lines
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<CartView>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        load_cart_view(&mut conn, user_id).await
    }

    /// Item count, line count and total; zeros when there is no cart
    pub async fn stats(&self, user_id: Uuid) -> Result<CartStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(ci.quantity), 0)::BIGINT AS item_count,
                   COUNT(ci.id) AS product_count,
                   COALESCE(SUM(ci.total_price), 0) AS total_price
            FROM shopping_carts c
            JOIN cart_items ci ON ci.cart_id = c.id
            JOIN products p ON p.id = ci.product_id
            WHERE c.user_id = $1 AND NOT p.deleted
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CartStats {
            item_count: row.try_get("item_count")?,
            product_count: row.try_get("product_count")?,
            total_price: round_money(row.try_get("total_price")?),
        })
    }

    /// Delete a cart owned by `user_id`
    pub async fn delete_cart(&self, user_id: Uuid, cart_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM shopping_carts WHERE id = $1 AND user_id = $2")
            .bind(cart_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(%user_id, %cart_id, "Cart deleted");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Remove one line from the user's cart. Removing the last line removes
    /// the cart, in which case `None` is returned.
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<CartView>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let cart_id = lock_cart_of(&mut tx, user_id)
            .await?
            .ok_or(StoreError::CartNotFound)?;

        let removed = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::NotFound("Cart item not found".to_string()));
        }

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .fetch_one(&mut *tx)
            .await?;

        if remaining == 0 {
            sqlx::query("DELETE FROM shopping_carts WHERE id = $1")
                .bind(cart_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(%user_id, %cart_id, "Last cart line removed, cart deleted");
            return Ok(None);
        }

        touch_cart(&mut tx, cart_id).await?;
        let view = load_cart_view(&mut tx, user_id).await?;
        tx.commit().await?;

        info!(%user_id, %cart_id, %item_id, "Cart line removed");
        Ok(view)
    }
}

async fn lock_cart_of(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
    let cart_id = sqlx::query_scalar("SELECT id FROM shopping_carts WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(cart_id)
}

/// Current price and stock of a sellable variant, locked until commit
async fn lock_variant(
    conn: &mut PgConnection,
    product_id: Uuid,
    sku: &str,
) -> Result<Option<VariantStock>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT p.price, v.stock_level
        FROM product_variants v
        JOIN products p ON p.id = v.product_id
        WHERE v.product_id = $1 AND v.sku = $2 AND NOT p.deleted
        FOR UPDATE OF v
        "#,
    )
    .bind(product_id)
    .bind(sku)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(VariantStock {
            product_id,
            sku: sku.to_string(),
            unit_price: row.try_get("price")?,
            stock_level: row.try_get("stock_level")?,
        })),
        None => Ok(None),
    }
}

async fn lines_of(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<CartLine>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT id, product_id, variant_sku, quantity, unit_price, total_price, added_at
        FROM cart_items
        WHERE cart_id = $1
        ORDER BY added_at, id
        "#,
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    let lines = rows
        .iter()
        .map(|row| {
            Ok(CartLine {
                id: row.try_get("id")?,
                product_id: row.try_get("product_id")?,
                variant_sku: row.try_get("variant_sku")?,
                quantity: row.try_get("quantity")?,
                unit_price: row.try_get("unit_price")?,
                total_price: row.try_get("total_price")?,
                added_at: row.try_get("added_at")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(lines)
}

async fn insert_line(
    conn: &mut PgConnection,
    cart_id: Uuid,
    line: &NewCartLine,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO cart_items (cart_id, product_id, variant_sku, quantity, unit_price, total_price)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(cart_id)
    .bind(line.product_id)
    .bind(&line.variant_sku)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.total_price)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 1 => Ok(()),
        Ok(_) => Err(StoreError::CartPersistenceFailure),
        Err(err) if common::error::sqlstate_of(&err).as_deref() == Some(sqlstate::CHECK_VIOLATION) => {
            Err(StoreError::Validation("Quantity must be greater than zero".to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

async fn touch_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<(), StoreError> {
    sqlx::query("UPDATE shopping_carts SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn item_view_from_row(row: &PgRow) -> Result<CartItemView, sqlx::Error> {
    Ok(CartItemView {
        id: row.try_get("id")?,
        product: LineProduct {
            id: row.try_get("product_id")?,
            name: row.try_get("product_name")?,
            image_url: row.try_get("product_image_url")?,
        },
        product_variant: LineVariant {
            product_sku: row.try_get("variant_sku")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        },
        total_price: row.try_get("total_price")?,
        added_at: row.try_get("added_at")?,
    })
}

/// Cart with product name and image joined in; an empty cart reads as absent
async fn load_cart_view(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<CartView>, StoreError> {
    let Some(cart) = sqlx::query(
        "SELECT id, user_id, created_at, updated_at FROM shopping_carts WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let cart_id: Uuid = cart.try_get("id")?;
    let rows = sqlx::query(
        r#"
        SELECT ci.id, ci.product_id, p.name AS product_name, p.image_url AS product_image_url,
               ci.variant_sku, ci.quantity, ci.unit_price, ci.total_price, ci.added_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1 AND NOT p.deleted
        ORDER BY ci.added_at, ci.id
        "#,
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    let items = rows
        .iter()
        .map(item_view_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(CartView {
        id: cart_id,
        user_id: cart.try_get("user_id")?,
        total_price: CartView::total_of(&items),
        items,
        created_at: cart.try_get("created_at")?,
        updated_at: cart.try_get("updated_at")?,
    }))
}
