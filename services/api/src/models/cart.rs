//! Shopping cart models and the merge-or-append decision

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::round_money;
use crate::error::StoreError;

/// Line total for `quantity` units at `unit_price`, rounded to cents
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    round_money(Decimal::from(quantity) * unit_price)
}

/// Stored cart line as read inside the cart transaction
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub added_at: DateTime<Utc>,
}

/// Current price and stock of one variant, read under a row lock
#[derive(Debug, Clone)]
pub struct VariantStock {
    pub product_id: Uuid,
    pub sku: String,
    pub unit_price: Decimal,
    pub stock_level: i32,
}

/// Line to insert, priced from the catalog at the moment of the add
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartLine {
    pub product_id: Uuid,
    pub variant_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl NewCartLine {
    fn priced(stock: &VariantStock, quantity: i32) -> Self {
        Self {
            product_id: stock.product_id,
            variant_sku: stock.sku.clone(),
            quantity,
            unit_price: stock.unit_price,
            total_price: line_total(quantity, stock.unit_price),
        }
    }
}

/// Write the cart transaction has to perform for one add request
#[derive(Debug, Clone, PartialEq)]
pub enum CartMutation {
    /// No cart yet: create one holding this single line
    CreateCart(NewCartLine),
    /// Same product and SKU already in the cart: bump it and re-price
    MergeLine {
        item_id: Uuid,
        added_quantity: i32,
        quantity: i32,
        unit_price: Decimal,
        total_price: Decimal,
    },
    /// Cart exists without this product and SKU
    AppendLine(NewCartLine),
}

/// Decide how an add request changes the cart.
///
/// `cart` is `None` when the user has no cart. Stock is checked against the
/// merged quantity when a line for the same `(product, sku)` already exists,
/// and against the requested quantity otherwise.
pub fn plan_add_item(
    cart: Option<&[CartLine]>,
    stock: &VariantStock,
    quantity: i32,
) -> Result<CartMutation, StoreError> {
    if quantity <= 0 {
        return Err(StoreError::Validation(
            "Quantity must be greater than zero".to_string(),
        ));
    }

    let insufficient = || StoreError::InsufficientStock {
        sku: stock.sku.clone(),
        available: stock.stock_level,
    };

    let Some(lines) = cart else {
        if quantity > stock.stock_level {
            return Err(insufficient());
        }
        return Ok(CartMutation::CreateCart(NewCartLine::priced(stock, quantity)));
    };

    let existing = lines
        .iter()
        .find(|line| line.product_id == stock.product_id && line.variant_sku == stock.sku);

    match existing {
        Some(line) => {
            let merged = line.quantity.checked_add(quantity).ok_or_else(insufficient)?;
            if merged > stock.stock_level {
                return Err(insufficient());
            }
            Ok(CartMutation::MergeLine {
                item_id: line.id,
                added_quantity: quantity,
                quantity: merged,
                unit_price: stock.unit_price,
                total_price: line_total(merged, stock.unit_price),
            })
        }
        None => {
            if quantity > stock.stock_level {
                return Err(insufficient());
            }
            Ok(CartMutation::AppendLine(NewCartLine::priced(stock, quantity)))
        }
    }
}

/// Product fields shown next to a cart or order line
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineProduct {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineVariant {
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: Uuid,
    pub product: LineProduct,
    pub product_variant: LineVariant,
    pub total_price: Decimal,
    pub added_at: DateTime<Utc>,
}

/// Cart as returned to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItemView>,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    pub fn total_of(items: &[CartItemView]) -> Decimal {
        round_money(items.iter().map(|item| item.total_price).sum())
    }
}

/// Derived cart totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartStats {
    /// Sum of quantities over all lines
    pub item_count: i64,
    /// Number of lines
    pub product_count: i64,
    pub total_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ProductRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRef {
    pub product_sku: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemInput {
    pub product: ProductRef,
    pub product_variant: VariantRef,
}

/// Body of `POST /shopping-carts`
#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    #[serde(default)]
    pub items: Vec<CartItemInput>,
}

/// Validated add-to-cart command
#[derive(Debug, Clone, PartialEq)]
pub struct AddCartItem {
    pub product_id: Uuid,
    pub variant_sku: String,
    pub quantity: i32,
}

impl AddCartItemRequest {
    pub fn into_command(self) -> Result<AddCartItem, StoreError> {
        let mut items = self.items.into_iter();
        let (Some(item), None) = (items.next(), items.next()) else {
            return Err(StoreError::Validation(
                "Exactly one cart item is required".to_string(),
            ));
        };

        let product_id = Uuid::parse_str(item.product.id.trim())
            .map_err(|_| StoreError::Validation("Invalid product id".to_string()))?;

        let variant_sku = item.product_variant.product_sku.trim().to_string();
        if variant_sku.is_empty() {
            return Err(StoreError::Validation("Product SKU is required".to_string()));
        }

        let quantity = i32::try_from(item.product_variant.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                StoreError::Validation("Quantity must be greater than zero".to_string())
            })?;

        Ok(AddCartItem {
            product_id,
            variant_sku,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn red_large(stock_level: i32, cents: i64) -> VariantStock {
        VariantStock {
            product_id: Uuid::from_u128(1),
            sku: "RED-L-001".to_string(),
            unit_price: Decimal::new(cents, 2),
            stock_level,
        }
    }

    fn line_for(stock: &VariantStock, quantity: i32) -> CartLine {
        CartLine {
            id: Uuid::from_u128(99),
            product_id: stock.product_id,
            variant_sku: stock.sku.clone(),
            quantity,
            unit_price: stock.unit_price,
            total_price: line_total(quantity, stock.unit_price),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_first_add_creates_cart() {
        let stock = red_large(10, 1000);
        let mutation = plan_add_item(None, &stock, 2).unwrap();

        let CartMutation::CreateCart(line) = mutation else {
            panic!("expected a new cart, got {mutation:?}");
        };
        assert_eq!(line.quantity, 2);
        assert_eq!(line.total_price, Decimal::new(2000, 2));
    }

    #[test]
    fn test_repeat_add_merges_existing_line() {
        let stock = red_large(10, 1000);
        let cart = vec![line_for(&stock, 2)];

        let mutation = plan_add_item(Some(cart.as_slice()), &stock, 3).unwrap();
        assert_eq!(
            mutation,
            CartMutation::MergeLine {
                item_id: cart[0].id,
                added_quantity: 3,
                quantity: 5,
                unit_price: Decimal::new(1000, 2),
                total_price: Decimal::new(5000, 2),
            }
        );
    }

    #[test]
    fn test_merge_checks_stock_against_merged_quantity() {
        let stock = red_large(4, 1000);
        let cart = vec![line_for(&stock, 3)];

        let err = plan_add_item(Some(cart.as_slice()), &stock, 2).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock { ref sku, available: 4 } if sku == "RED-L-001"
        ));
    }

    #[test]
    fn test_merge_reprices_at_current_price() {
        let old = red_large(20, 1000);
        let cart = vec![line_for(&old, 2)];
        let repriced = red_large(20, 1234);

        let CartMutation::MergeLine {
            quantity,
            unit_price,
            total_price,
            ..
        } = plan_add_item(Some(cart.as_slice()), &repriced, 3).unwrap()
        else {
            panic!("expected a merge");
        };
        assert_eq!(quantity, 5);
        assert_eq!(unit_price, Decimal::new(1234, 2));
        assert_eq!(total_price, Decimal::new(6170, 2));
        assert_eq!(total_price, line_total(2 + 3, repriced.unit_price));
    }

    #[test]
    fn test_other_sku_appends_line() {
        let stock = red_large(10, 1000);
        let mut other = line_for(&stock, 1);
        other.variant_sku = "RED-M-001".to_string();

        let mutation = plan_add_item(Some(&[other][..]), &stock, 10).unwrap();
        assert!(matches!(mutation, CartMutation::AppendLine(ref l) if l.quantity == 10));

        let err = plan_add_item(Some(&[][..]), &stock, 11).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let stock = red_large(10, 1000);
        assert!(matches!(
            plan_add_item(None, &stock, 0),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_line_total_rounds_to_cents() {
        assert_eq!(line_total(3, Decimal::new(3335, 3)), Decimal::new(1001, 2));
    }

    #[test]
    fn test_request_parses_single_item() {
        let request: AddCartItemRequest = serde_json::from_value(json!({
            "items": [{
                "product": { "_id": "00000000-0000-0000-0000-000000000001", "name": "Shirt" },
                "productVariant": { "productSku": "RED-L-001", "quantity": 2 }
            }]
        }))
        .unwrap();

        let command = request.into_command().unwrap();
        assert_eq!(command.product_id, Uuid::from_u128(1));
        assert_eq!(command.variant_sku, "RED-L-001");
        assert_eq!(command.quantity, 2);
    }

    #[test]
    fn test_request_rejects_bad_items() {
        let empty = AddCartItemRequest { items: vec![] };
        assert!(empty.into_command().is_err());

        let negative: AddCartItemRequest = serde_json::from_value(json!({
            "items": [{
                "product": { "id": "00000000-0000-0000-0000-000000000001" },
                "productVariant": { "productSku": "RED-L-001", "quantity": -1 }
            }]
        }))
        .unwrap();
        assert!(matches!(
            negative.into_command(),
            Err(StoreError::Validation(_))
        ));

        let bad_id: AddCartItemRequest = serde_json::from_value(json!({
            "items": [{
                "product": { "_id": "not-a-uuid" },
                "productVariant": { "productSku": "RED-L-001", "quantity": 1 }
            }]
        }))
        .unwrap();
        assert!(bad_id.into_command().is_err());
    }
}
