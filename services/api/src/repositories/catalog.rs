//! Catalog repository: categories, products and variant stock

use common::error::{is_unique_violation, sqlstate, sqlstate_of};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::catalog::{
    Category, CategorySummary, NewCategory, NewProduct, Product, ProductQuery, UpdateProduct,
    Variant, VariantAttributes, VariantInput, like_pattern, merge_variants, unseen_variants,
};
use crate::models::slugify;

/// Number of products returned for a category preview
const CATEGORY_PREVIEW_LIMIT: i64 = 3;

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.slug, p.description, p.price, p.image_url, p.deleted,
           p.created_at, p.updated_at,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug
    FROM products p
    JOIN categories c ON c.id = p.category_id
"#;

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn variant_from_row(row: &PgRow) -> Result<Variant, sqlx::Error> {
    let Json(attributes): Json<VariantAttributes> = row.try_get("attributes")?;
    Ok(Variant {
        sku: row.try_get("sku")?,
        stock_level: row.try_get("stock_level")?,
        attributes,
    })
}

fn product_from_row(row: &PgRow, variants: Vec<Variant>) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        category: CategorySummary {
            id: row.try_get("category_id")?,
            name: row.try_get("category_name")?,
            slug: row.try_get("category_slug")?,
        },
        image_url: row.try_get("image_url")?,
        variants,
        deleted: row.try_get("deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Category repository for database operations
#[derive(Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, slug, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(category_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, slug, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(category_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, payload: &NewCategory) -> Result<Category, StoreError> {
        let name = payload.name.trim();

        let result = sqlx::query(
            r#"
            INSERT INTO categories (name, slug)
            VALUES ($1, $2)
            RETURNING id, name, slug, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(slugify(name))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let category = category_from_row(&row)?;
                info!(category_id = %category.id, slug = %category.slug, "Category created");
                Ok(category)
            }
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
                "Category {name} already exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a category that no live product references. Withdrawn
    /// products of the category are purged with it.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM products WHERE category_id = $1 AND deleted")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await;

        match result {
            Ok(done) => {
                tx.commit().await?;
                Ok(done.rows_affected() > 0)
            }
            Err(err) if sqlstate_of(&err).as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION) => {
                Err(StoreError::Conflict(
                    "Category still has products and cannot be deleted".to_string(),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Outcome of `POST /products`
#[derive(Debug)]
pub enum ProductCreation {
    Created(Product),
    /// A product with the same slug existed; only new SKUs were added
    VariantsAdded(Product),
}

/// Product repository for database operations
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Non-deleted products, newest first
    pub async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query(&format!(
            r#"{PRODUCT_SELECT}
            WHERE NOT p.deleted
              AND ($1::text IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1)
              AND ($2::uuid IS NULL OR p.category_id = $2)
            ORDER BY p.created_at DESC
            "#
        ))
        .bind(search)
        .bind(query.category_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        with_variants(&mut conn, rows).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        load_product(&mut conn, id, false).await
    }

    /// Product owning `sku`, with only that variant attached
    pub async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            r#"{PRODUCT_SELECT}
            JOIN product_variants v ON v.product_id = p.id
            WHERE v.sku = $1 AND NOT p.deleted
            "#
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let variant = sqlx::query(
            "SELECT sku, stock_level, attributes FROM product_variants WHERE sku = $1",
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        match variant {
            Some(variant) => Ok(Some(product_from_row(&row, vec![variant_from_row(&variant)?])?)),
            None => Ok(None),
        }
    }

    /// Latest products of a category
    pub async fn latest_in_category(&self, category_id: Uuid) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"{PRODUCT_SELECT}
            WHERE p.category_id = $1 AND NOT p.deleted
            ORDER BY p.created_at DESC
            LIMIT $2
            "#
        ))
        .bind(category_id)
        .bind(CATEGORY_PREVIEW_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        with_variants(&mut conn, rows).await
    }

    /// Create a product, or add the unseen variants to the product with the same slug
    pub async fn create(&self, payload: &NewProduct) -> Result<ProductCreation, StoreError> {
        let name = payload.name.trim();
        let slug = slugify(name);
        let mut tx = self.pool.begin().await?;

        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM products WHERE slug = $1 FOR UPDATE")
                .bind(&slug)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(product_id) = existing {
            let current = variants_of(&mut tx, product_id).await?;
            let fresh = unseen_variants(&current, &payload.variants);
            if fresh.is_empty() {
                warn!(%slug, "Product already has every submitted variant");
                return Err(StoreError::Conflict(
                    "Product already exists with the same variants".to_string(),
                ));
            }

            for variant in &fresh {
                insert_variant(&mut tx, product_id, variant).await?;
            }
            touch_product(&mut tx, product_id).await?;

            let product = load_product(&mut tx, product_id, true)
                .await?
                .ok_or_else(|| StoreError::NotFound("Product not found".to_string()))?;
            tx.commit().await?;

            info!(product_id = %product_id, added = fresh.len(), "Variants added to existing product");
            return Ok(ProductCreation::VariantsAdded(product));
        }

        let result = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, slug, description, price, category_id, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(&slug)
        .bind(payload.description.trim())
        .bind(payload.price)
        .bind(payload.category_id)
        .bind(payload.image_url.as_deref())
        .fetch_one(&mut *tx)
        .await;

        let product_id: Uuid = match result {
            Ok(id) => id,
            Err(err) if sqlstate_of(&err).as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION) => {
                return Err(StoreError::NotFound("Category not found".to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        for variant in payload.variants.iter().map(VariantInput::to_variant) {
            insert_variant(&mut tx, product_id, &variant).await?;
        }

        let product = load_product(&mut tx, product_id, true)
            .await?
            .ok_or_else(|| StoreError::NotFound("Product not found".to_string()))?;
        tx.commit().await?;

        info!(product_id = %product_id, %slug, "Product created");
        Ok(ProductCreation::Created(product))
    }

    /// Apply a partial update. Returns `None` when the product does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &UpdateProduct,
    ) -> Result<Option<Product>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let name = changes.name.as_deref().map(str::trim);
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                category_id = COALESCE($6, category_id),
                image_url = COALESCE($7, image_url),
                deleted = COALESCE($8, deleted),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(name.map(slugify))
        .bind(changes.description.as_deref().map(str::trim))
        .bind(changes.price)
        .bind(changes.category_id)
        .bind(changes.image_url.as_deref())
        .bind(changes.deleted)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(StoreError::Conflict(
                    "A product with this name already exists".to_string(),
                ));
            }
            Err(err) if sqlstate_of(&err).as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION) => {
                return Err(StoreError::NotFound("Category not found".to_string()));
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(incoming) = &changes.variants {
            let current = variants_of(&mut tx, id).await?;
            for variant in merge_variants(&current, incoming) {
                upsert_variant(&mut tx, id, &variant).await?;
            }
        }

        let product = load_product(&mut tx, id, true).await?;
        tx.commit().await?;

        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Soft delete: the row stays for order history, but the product no
    /// longer resolves in the catalog or in carts.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET deleted = true, updated_at = now() WHERE id = $1 AND NOT deleted",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(product_id = %id, "Product deleted");
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_variant(&self, id: Uuid, sku: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE product_id = $1 AND sku = $2")
            .bind(id)
            .bind(sku)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Take `quantity` units out of stock without ever going negative
    pub async fn sell(&self, id: Uuid, sku: &str, quantity: i32) -> Result<Variant, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock_level = stock_level - $3
            WHERE product_id = $1 AND sku = $2 AND stock_level >= $3
            RETURNING sku, stock_level, attributes
            "#,
        )
        .bind(id)
        .bind(sku)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let variant = variant_from_row(&row)?;
            info!(product_id = %id, %sku, quantity, remaining = variant.stock_level, "Stock sold");
            return Ok(variant);
        }

        let available: Option<i32> = sqlx::query_scalar(
            "SELECT stock_level FROM product_variants WHERE product_id = $1 AND sku = $2",
        )
        .bind(id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        match available {
            Some(available) => {
                warn!(product_id = %id, %sku, quantity, available, "Sale rejected, insufficient stock");
                Err(StoreError::InsufficientStock {
                    sku: sku.to_string(),
                    available,
                })
            }
            None => Err(StoreError::ProductNotFound {
                product_id: id,
                sku: sku.to_string(),
            }),
        }
    }

    /// Put `quantity` units back into stock
    pub async fn receive(&self, id: Uuid, sku: &str, quantity: i32) -> Result<Variant, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock_level = stock_level + $3
            WHERE product_id = $1 AND sku = $2
            RETURNING sku, stock_level, attributes
            "#,
        )
        .bind(id)
        .bind(sku)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let variant = variant_from_row(&row)?;
                info!(product_id = %id, %sku, quantity, stock = variant.stock_level, "Stock received");
                Ok(variant)
            }
            None => Err(StoreError::ProductNotFound {
                product_id: id,
                sku: sku.to_string(),
            }),
        }
    }
}

async fn variants_of(conn: &mut PgConnection, product_id: Uuid) -> Result<Vec<Variant>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT sku, stock_level, attributes
        FROM product_variants
        WHERE product_id = $1
        ORDER BY created_at, sku
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(variant_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn insert_variant(
    conn: &mut PgConnection,
    product_id: Uuid,
    variant: &Variant,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO product_variants (sku, product_id, stock_level, attributes)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&variant.sku)
    .bind(product_id)
    .bind(variant.stock_level)
    .bind(Json(&variant.attributes))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
            "SKU {} already exists",
            variant.sku
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Insert or overwrite a variant of `product_id`. A SKU owned by another
/// product is left alone and reported as a conflict.
async fn upsert_variant(
    conn: &mut PgConnection,
    product_id: Uuid,
    variant: &Variant,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO product_variants (sku, product_id, stock_level, attributes)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (sku) DO UPDATE
        SET stock_level = EXCLUDED.stock_level,
            attributes = EXCLUDED.attributes
        WHERE product_variants.product_id = EXCLUDED.product_id
        "#,
    )
    .bind(&variant.sku)
    .bind(product_id)
    .bind(variant.stock_level)
    .bind(Json(&variant.attributes))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "SKU {} belongs to another product",
            variant.sku
        )));
    }
    Ok(())
}

async fn touch_product(conn: &mut PgConnection, product_id: Uuid) -> Result<(), StoreError> {
    sqlx::query("UPDATE products SET updated_at = now() WHERE id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Product with all its variants; soft-deleted ones only when asked for
async fn load_product(
    conn: &mut PgConnection,
    id: Uuid,
    include_deleted: bool,
) -> Result<Option<Product>, StoreError> {
    let row = sqlx::query(&format!("{PRODUCT_SELECT} WHERE p.id = $1 AND ($2 OR NOT p.deleted)"))
        .bind(id)
        .bind(include_deleted)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let variants = variants_of(conn, id).await?;
            Ok(Some(product_from_row(&row, variants)?))
        }
        None => Ok(None),
    }
}

/// Attach variants to a batch of product rows, keeping the row order
async fn with_variants(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Product>, StoreError> {
    let ids = rows
        .iter()
        .map(|row| row.try_get::<Uuid, _>("id"))
        .collect::<Result<Vec<_>, _>>()?;

    let variant_rows = sqlx::query(
        r#"
        SELECT product_id, sku, stock_level, attributes
        FROM product_variants
        WHERE product_id = ANY($1)
        ORDER BY created_at, sku
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_product: HashMap<Uuid, Vec<Variant>> = HashMap::new();
    for row in &variant_rows {
        let product_id: Uuid = row.try_get("product_id")?;
        by_product
            .entry(product_id)
            .or_default()
            .push(variant_from_row(row)?);
    }

    let products = rows
        .iter()
        .map(|row| {
            let id: Uuid = row.try_get("id")?;
            product_from_row(row, by_product.remove(&id).unwrap_or_default())
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(products)
}
