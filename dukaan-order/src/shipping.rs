use serde::{Deserialize, Serialize};

/// Flat-rate delivery with an optional free-shipping threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: i64,
    pub free_threshold: Option<i64>,
}

impl ShippingPolicy {
    /// Fee for an order whose discounted subtotal is `amount`. Empty carts ship free.
    pub fn fee_for(&self, amount: i64, has_items: bool) -> i64 {
        if !has_items {
            return 0;
        }
        match self.free_threshold {
            Some(threshold) if amount >= threshold => 0,
            _ => self.flat_fee.max(0),
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: 25_000,
            free_threshold: Some(500_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_above_threshold() {
        let policy = ShippingPolicy { flat_fee: 20_000, free_threshold: Some(300_000) };
        assert_eq!(policy.fee_for(299_999, true), 20_000);
        assert_eq!(policy.fee_for(300_000, true), 0);
        assert_eq!(policy.fee_for(0, false), 0);

        let always = ShippingPolicy { flat_fee: 20_000, free_threshold: None };
        assert_eq!(always.fee_for(10_000_000, true), 20_000);
    }
}
