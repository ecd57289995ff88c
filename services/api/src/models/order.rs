//! Order models and the order status state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::cart::{LineProduct, LineVariant};
use super::round_money;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Only a pending order can move, and only to a terminal state
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    pub fn transition_to(self, next: OrderStatus) -> Result<OrderStatus, StoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StoreError::InvalidStatusTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::Validation(format!(
                "Invalid order status: {other}"
            ))),
        }
    }
}

/// Cart line copied into an order, including what the catalog showed for it
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image_url: Option<String>,
    pub variant_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub added_at: DateTime<Utc>,
}

/// Order about to be inserted, built from the locked cart contents
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: Uuid,
    pub shopping_cart_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub total_price: Decimal,
    pub status: OrderStatus,
}

impl OrderDraft {
    /// Snapshot a cart into a pending order, recomputing the total from the lines
    pub fn from_cart(
        user_id: Uuid,
        shopping_cart_id: Uuid,
        lines: Vec<OrderLine>,
    ) -> Result<Self, StoreError> {
        if lines.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let total_price = round_money(lines.iter().map(|line| line.total_price).sum());

        Ok(Self {
            user_id,
            shopping_cart_id,
            lines,
            total_price,
            status: OrderStatus::Pending,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product: LineProduct,
    pub product_variant: LineVariant,
    pub total_price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl From<OrderLine> for OrderItemView {
    fn from(line: OrderLine) -> Self {
        Self {
            product: LineProduct {
                id: line.product_id,
                name: line.product_name,
                image_url: line.product_image_url,
            },
            product_variant: LineVariant {
                product_sku: line.variant_sku,
                quantity: line.quantity,
                unit_price: line.unit_price,
            },
            total_price: line.total_price,
            added_at: line.added_at,
        }
    }
}

/// Order as returned to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user: OrderUser,
    pub shopping_cart: Uuid,
    pub items: Vec<OrderItemView>,
    pub total_price: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /orders/create`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shopping_cart_id: Option<String>,
}

impl CreateOrderRequest {
    pub fn cart_id(&self) -> Result<Uuid, StoreError> {
        self.shopping_cart_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id.trim()).ok())
            .ok_or(StoreError::InvalidCartReference)
    }
}

/// Body of `PUT /orders/update-status/:orderId`
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, quantity: i32, cents: i64) -> OrderLine {
        let unit_price = Decimal::new(cents, 2);
        OrderLine {
            product_id: Uuid::new_v4(),
            product_name: "Summer Shirt".to_string(),
            product_image_url: None,
            variant_sku: sku.to_string(),
            quantity,
            unit_price,
            total_price: crate::models::cart::line_total(quantity, unit_price),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_draft_is_pending_with_recomputed_total() {
        let lines = vec![line("RED-L-001", 2, 2500), line("BLU-M-002", 1, 2500)];
        let draft = OrderDraft::from_cart(Uuid::new_v4(), Uuid::new_v4(), lines).unwrap();

        assert_eq!(draft.status, OrderStatus::Pending);
        assert_eq!(draft.total_price, Decimal::new(7500, 2));
        assert_eq!(draft.lines.len(), 2);
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let err = OrderDraft::from_cart(Uuid::new_v4(), Uuid::new_v4(), vec![]).unwrap_err();
        assert!(matches!(err, StoreError::EmptyCart));
    }

    #[test]
    fn test_draft_keeps_its_own_copy_of_lines() {
        let mut lines = vec![line("RED-L-001", 2, 1000)];
        let draft = OrderDraft::from_cart(Uuid::new_v4(), Uuid::new_v4(), lines.clone()).unwrap();

        lines[0].unit_price = Decimal::new(9999, 2);
        lines[0].total_price = Decimal::new(19998, 2);

        assert_eq!(draft.lines[0].total_price, Decimal::new(2000, 2));
        assert_eq!(draft.total_price, Decimal::new(2000, 2));
    }

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;

        assert_eq!(Pending.transition_to(Completed).unwrap(), Completed);
        assert_eq!(Pending.transition_to(Cancelled).unwrap(), Cancelled);
        assert!(Completed.transition_to(Pending).is_err());
        assert!(Cancelled.transition_to(Completed).is_err());
        assert!(Pending.transition_to(Pending).is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Completed".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert!(matches!(
            "shipped".parse::<OrderStatus>(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_create_request_requires_valid_cart_id() {
        let missing = CreateOrderRequest {
            shopping_cart_id: None,
        };
        assert!(matches!(missing.cart_id(), Err(StoreError::InvalidCartReference)));

        let malformed = CreateOrderRequest {
            shopping_cart_id: Some("abc".to_string()),
        };
        assert!(matches!(malformed.cart_id(), Err(StoreError::InvalidCartReference)));

        let id = Uuid::new_v4();
        let valid = CreateOrderRequest {
            shopping_cart_id: Some(id.to_string()),
        };
        assert_eq!(valid.cart_id().unwrap(), id);
    }
}
