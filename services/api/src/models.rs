//! API models for request and response payloads

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::OnceLock;

pub mod cart;
pub mod catalog;
pub mod order;
pub mod stats;
pub mod user;

/// Round a monetary amount to cents, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// URL slug for a product or category name: lowercase, whitespace runs become `-`
pub fn slugify(name: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let regex = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("Failed to compile slug regex"));

    regex.replace_all(name.trim(), "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_rounds_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_money(Decimal::new(1004, 3)), Decimal::new(100, 2));
        assert_eq!(round_money(Decimal::new(20, 0)), Decimal::new(2000, 2));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Summer   T-Shirt "), "summer-t-shirt");
        assert_eq!(slugify("Shoes"), "shoes");
    }
}
