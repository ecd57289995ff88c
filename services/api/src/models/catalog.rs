//! Catalog models: categories, products and their variants

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::error::StoreError;

/// Free-form variant attributes such as `color` or `size`
pub type VariantAttributes = BTreeMap<String, String>;

/// Category entity
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category reference embedded in a product
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Sellable variant of a product, identified by a globally unique SKU
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub sku: String,
    pub stock_level: i32,
    pub attributes: VariantAttributes,
}

/// Product entity with its variants
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub category: CategorySummary,
    pub image_url: Option<String>,
    pub variants: Vec<Variant>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for category creation
#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation(
                "Category name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Variant payload used by product creation and update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    pub sku: String,
    pub stock_level: i32,
    #[serde(default)]
    pub attributes: VariantAttributes,
}

impl VariantInput {
    fn validate(&self) -> Result<(), StoreError> {
        if self.sku.trim().is_empty() {
            return Err(StoreError::Validation("Variant SKU is required".to_string()));
        }
        if self.stock_level < 0 {
            return Err(StoreError::Validation(format!(
                "Stock level for SKU {} must not be negative",
                self.sku
            )));
        }
        Ok(())
    }

    pub fn to_variant(&self) -> Variant {
        Variant {
            sku: self.sku.trim().to_string(),
            stock_level: self.stock_level,
            attributes: self.attributes.clone(),
        }
    }
}

fn validate_variants(variants: &[VariantInput]) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    for variant in variants {
        variant.validate()?;
        if !seen.insert(variant.sku.trim()) {
            return Err(StoreError::Validation(format!(
                "Duplicate SKU {} in request",
                variant.sku
            )));
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let len = name.trim().chars().count();
    if !(3..=100).contains(&len) {
        return Err(StoreError::Validation(
            "Product name must be between 3 and 100 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), StoreError> {
    if description.trim().chars().count() < 10 {
        return Err(StoreError::Validation(
            "Product description must be at least 10 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), StoreError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(StoreError::Validation(
            "Product price must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Request for product creation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Uuid,
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_price(self.price)?;
        if self.variants.is_empty() {
            return Err(StoreError::Validation(
                "At least one variant is required".to_string(),
            ));
        }
        validate_variants(&self.variants)
    }
}

/// Partial product update
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub deleted: Option<bool>,
    pub variants: Option<Vec<VariantInput>>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(variants) = &self.variants {
            if variants.is_empty() {
                return Err(StoreError::Validation(
                    "Variants must be a non-empty array".to_string(),
                ));
            }
            validate_variants(variants)?;
        }
        Ok(())
    }
}

/// Stock movement for a single variant
#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub quantity: i32,
}

impl StockAdjustment {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.quantity <= 0 {
            return Err(StoreError::Validation(
                "Valid quantity is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query parameters for product listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    /// Case-insensitive match on name or description
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
}

/// Variants from `incoming` whose SKU the product does not have yet
pub fn unseen_variants(existing: &[Variant], incoming: &[VariantInput]) -> Vec<Variant> {
    let known: HashSet<&str> = existing.iter().map(|v| v.sku.as_str()).collect();
    incoming
        .iter()
        .map(VariantInput::to_variant)
        .filter(|v| !known.contains(v.sku.as_str()))
        .collect()
}

/// Replace same-SKU variants with the incoming version and append new SKUs
pub fn merge_variants(existing: &[Variant], incoming: &[VariantInput]) -> Vec<Variant> {
    let mut merged: Vec<Variant> = existing
        .iter()
        .map(|current| {
            incoming
                .iter()
                .find(|v| v.sku.trim() == current.sku)
                .map(VariantInput::to_variant)
                .unwrap_or_else(|| current.clone())
        })
        .collect();
    merged.extend(unseen_variants(existing, incoming));
    merged
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(sku: &str, stock_level: i32) -> Variant {
        Variant {
            sku: sku.to_string(),
            stock_level,
            attributes: VariantAttributes::new(),
        }
    }

    fn input(sku: &str, stock_level: i32) -> VariantInput {
        VariantInput {
            sku: sku.to_string(),
            stock_level,
            attributes: VariantAttributes::from([("size".to_string(), "L".to_string())]),
        }
    }

    #[test]
    fn test_unseen_variants_skips_known_skus() {
        let existing = vec![variant("RED-L-001", 4)];
        let fresh = unseen_variants(&existing, &[input("RED-L-001", 9), input("BLU-M-002", 2)]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].sku, "BLU-M-002");
    }

    #[test]
    fn test_merge_variants_replaces_and_appends() {
        let existing = vec![variant("RED-L-001", 4), variant("RED-M-001", 1)];
        let merged = merge_variants(&existing, &[input("RED-L-001", 9), input("BLU-M-002", 2)]);

        assert_eq!(
            merged.iter().map(|v| v.sku.as_str()).collect::<Vec<_>>(),
            vec!["RED-L-001", "RED-M-001", "BLU-M-002"]
        );
        assert_eq!(merged[0].stock_level, 9);
        assert_eq!(merged[0].attributes.get("size").map(String::as_str), Some("L"));
        assert_eq!(merged[1].stock_level, 1);
    }

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            name: "Summer Shirt".to_string(),
            description: "A light cotton shirt".to_string(),
            price: Decimal::new(1000, 2),
            category_id: Uuid::new_v4(),
            image_url: None,
            variants: vec![input("RED-L-001", 10)],
        };
        assert!(product.validate().is_ok());

        product.variants.push(input("RED-L-001", 3));
        assert!(matches!(product.validate(), Err(StoreError::Validation(_))));

        product.variants.pop();
        product.price = Decimal::new(-1, 2);
        assert!(matches!(product.validate(), Err(StoreError::Validation(_))));

        product.price = Decimal::ZERO;
        product.description = "short".to_string();
        assert!(matches!(product.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_update_rejects_empty_variant_list() {
        let update = UpdateProduct {
            variants: Some(vec![]),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(UpdateProduct::default().validate().is_ok());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("shirt"), "%shirt%");
    }

    #[test]
    fn test_stock_adjustment_requires_positive_quantity() {
        assert!(StockAdjustment { quantity: 0 }.validate().is_err());
        assert!(StockAdjustment { quantity: 3 }.validate().is_ok());
    }
}
