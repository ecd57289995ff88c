//! Order repository: checkout from a cart, listing and status changes

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::order::{Order, OrderDraft, OrderItemView, OrderLine, OrderStatus, OrderUser};

/// Order repository for database operations
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into a pending order and delete the cart, all in
    /// one transaction. The cart is looked up by id and owner together.
    pub async fn create_from_cart(&self, user_id: Uuid, cart_id: Uuid) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM shopping_carts WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(cart_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if owned.is_none() {
            warn!(%user_id, %cart_id, "Checkout of unknown cart");
            return Err(StoreError::CartNotFound);
        }

        let lines = cart_lines_snapshot(&mut tx, cart_id).await?;
        let draft = OrderDraft::from_cart(user_id, cart_id, lines)?;

        let order_id = insert_order(&mut tx, &draft).await.map_err(|err| {
            error!(%user_id, %cart_id, error = %err, "Order insert failed");
            StoreError::OrderPersistenceFailure
        })?;

        let removed = sqlx::query("DELETE FROM shopping_carts WHERE id = $1 AND user_id = $2")
            .bind(cart_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                error!(%user_id, %cart_id, error = %err, "Cart teardown failed");
                StoreError::CartTeardownFailure
            })?;
        if removed.rows_affected() != 1 {
            error!(%user_id, %cart_id, "Cart vanished before teardown");
            return Err(StoreError::CartTeardownFailure);
        }

        let order = fetch_orders(&mut tx, None, Some(order_id))
            .await?
            .pop()
            .ok_or(StoreError::OrderPersistenceFailure)?;
        tx.commit().await?;

        info!(%user_id, %cart_id, order_id = %order.id, total = %order.total_price, "Order created");
        Ok(order)
    }

    /// Orders of one user, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_orders(&mut conn, Some(user_id), None).await
    }

    /// Every order, newest first
    pub async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_orders(&mut conn, None, None).await
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_orders(&mut conn, None, Some(order_id)).await?.pop())
    }

    /// Move an order to `next` if the transition table allows it
    pub async fn update_status(&self, order_id: Uuid, next: OrderStatus) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        let current: OrderStatus = current
            .ok_or_else(|| StoreError::NotFound("Order not found".to_string()))?
            .parse()?;

        let next = current.transition_to(next).inspect_err(|err| {
            warn!(%order_id, error = %err, "Order status change rejected");
        })?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(order_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        let order = fetch_orders(&mut tx, None, Some(order_id))
            .await?
            .pop()
            .ok_or_else(|| StoreError::NotFound("Order not found".to_string()))?;
        tx.commit().await?;

        info!(%order_id, from = %current, to = %next, "Order status updated");
        Ok(order)
    }
}

/// Copy of the live cart lines with the product name and image as they are now
async fn cart_lines_snapshot(
    conn: &mut PgConnection,
    cart_id: Uuid,
) -> Result<Vec<OrderLine>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT ci.product_id, p.name AS product_name, p.image_url AS product_image_url,
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

    Ok(rows
        .iter()
        .map(order_line_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn insert_order(conn: &mut PgConnection, draft: &OrderDraft) -> Result<Uuid, sqlx::Error> {
    let order_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO orders (user_id, shopping_cart_id, total_price, status)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(draft.user_id)
    .bind(draft.shopping_cart_id)
    .bind(draft.total_price)
    .bind(draft.status.as_str())
    .fetch_one(&mut *conn)
    .await?;

    for (position, line) in draft.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, product_id, product_name, product_image_url,
                                     variant_sku, quantity, unit_price, total_price, added_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order_id)
        .bind(position as i32)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(line.product_image_url.as_deref())
        .bind(&line.variant_sku)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.total_price)
        .bind(line.added_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(order_id)
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine, sqlx::Error> {
    Ok(OrderLine {
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        product_image_url: row.try_get("product_image_url")?,
        variant_sku: row.try_get("variant_sku")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        total_price: row.try_get("total_price")?,
        added_at: row.try_get("added_at")?,
    })
}

/// Orders with their owner and lines, optionally narrowed to one user or one order
async fn fetch_orders(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    order_id: Option<Uuid>,
) -> Result<Vec<Order>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT o.id, o.shopping_cart_id, o.total_price, o.order_date, o.status,
               o.created_at, o.updated_at,
               u.id AS user_id, u.name AS user_name, u.email AS user_email
        FROM orders o
        JOIN users u ON u.id = o.user_id
        WHERE ($1::uuid IS NULL OR o.user_id = $1)
          AND ($2::uuid IS NULL OR o.id = $2)
        ORDER BY o.order_date DESC, o.id
        "#,
    )
    .bind(user_id)
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids = rows
        .iter()
        .map(|row| row.try_get::<Uuid, _>("id"))
        .collect::<Result<Vec<_>, _>>()?;

    let item_rows = sqlx::query(
        r#"
        SELECT order_id, product_id, product_name, product_image_url, variant_sku,
               quantity, unit_price, total_price, added_at
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
    for row in &item_rows {
        let order_id: Uuid = row.try_get("order_id")?;
        items
            .entry(order_id)
            .or_default()
            .push(order_line_from_row(row)?.into());
    }

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: Uuid = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        orders.push(Order {
            id,
            user: OrderUser {
                id: row.try_get("user_id")?,
                name: row.try_get("user_name")?,
                email: row.try_get("user_email")?,
            },
            shopping_cart: row.try_get("shopping_cart_id")?,
            items: items.remove(&id).unwrap_or_default(),
            total_price: row.try_get("total_price")?,
            order_date: row.try_get("order_date")?,
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        });
    }

    Ok(orders)
}
