use rust_decimal::Decimal;
use serde::Serialize;

/// Store-wide totals for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_orders: i64,
    pub total_products: i64,
    pub total_customers: i64,
    pub total_categories: i64,
    pub total_revenue: Decimal,
}
