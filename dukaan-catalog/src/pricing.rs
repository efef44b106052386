use serde::{Deserialize, Serialize};

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Flat amount in minor units taken off the original price.
    Fixed,
    /// Whole-number percent off the original price.
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "fixed",
            DiscountType::Percentage => "percentage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(DiscountType::Fixed),
            "percentage" => Some(DiscountType::Percentage),
            _ => None,
        }
    }
}

/// Apply a discount to a price held in minor units. The result never drops below zero.
pub fn apply_discount(original: i64, discount_type: DiscountType, value: f64) -> i64 {
    let original = original.max(0);
    let value = if value.is_finite() { value.max(0.0) } else { 0.0 };

    match discount_type {
        DiscountType::Fixed => (original - value.round() as i64).max(0),
        DiscountType::Percentage => {
            let pct = value.min(100.0);
            let discounted = original as f64 * (100.0 - pct) / 100.0;
            // half-up to the nearest minor unit
            (discounted + 0.5).floor().max(0.0) as i64
        }
    }
}

/// Whole-number percent of `part` relative to `whole`, rounded half-up.
pub fn percent_of(part: i64, whole: i64) -> u32 {
    if whole <= 0 || part <= 0 {
        return 0;
    }
    ((part as f64 * 100.0 / whole as f64) + 0.5).floor() as u32
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Savings {
    pub original: i64,
    pub discounted: i64,
    pub amount: i64,
    pub percentage: u32,
}

impl Savings {
    pub fn between(original: i64, discounted: i64) -> Self {
        let amount = (original - discounted).max(0);
        Self {
            original,
            discounted,
            amount,
            percentage: percent_of(amount, original),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_discount_clamps_to_zero() {
        assert_eq!(apply_discount(10_000, DiscountType::Fixed, 2_500.0), 7_500);
        assert_eq!(apply_discount(10_000, DiscountType::Fixed, 25_000.0), 0);
        assert_eq!(apply_discount(10_000, DiscountType::Fixed, -100.0), 10_000);
    }

    #[test]
    fn test_percentage_discount_rounds_half_up() {
        assert_eq!(apply_discount(10_000, DiscountType::Percentage, 15.0), 8_500);
        // 999 * 0.85 = 849.15
        assert_eq!(apply_discount(999, DiscountType::Percentage, 15.0), 849);
        // 333 * 0.5 = 166.5
        assert_eq!(apply_discount(333, DiscountType::Percentage, 50.0), 167);
        assert_eq!(apply_discount(10_000, DiscountType::Percentage, 150.0), 0);
        assert_eq!(apply_discount(10_000, DiscountType::Percentage, f64::NAN), 10_000);
    }

    #[test]
    fn test_savings() {
        let savings = Savings::between(12_000, 9_000);
        assert_eq!(savings.amount, 3_000);
        assert_eq!(savings.percentage, 25);

        let none = Savings::between(0, 0);
        assert_eq!(none.percentage, 0);
    }
}
