use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use dukaan_catalog::pricing::{apply_discount, DiscountType};
use dukaan_shared::ValidationErrors;

/// A discount code customers can apply to their cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    pub min_order_amount: Option<i64>,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn from_input(input: CouponInput) -> Self {
        let now = Utc::now();
        let mut coupon = Self {
            id: Uuid::new_v4(),
            code: String::new(),
            discount_type: input.discount_type,
            value: 0.0,
            min_order_amount: None,
            max_discount: None,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        coupon.apply_input(input);
        coupon
    }

    pub fn apply_input(&mut self, input: CouponInput) {
        self.code = normalize_code(&input.code);
        self.discount_type = input.discount_type;
        self.value = input.value;
        self.min_order_amount = input.min_order_amount;
        self.max_discount = input.max_discount;
        self.usage_limit = input.usage_limit;
        self.starts_at = input.starts_at;
        self.expires_at = input.expires_at;
        if let Some(active) = input.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    /// Check whether the coupon may be used on a cart with this subtotal.
    pub fn validate_for(&self, subtotal: i64, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive(self.code.clone()));
        }
        if self.starts_at.map_or(false, |start| now < start) {
            return Err(CouponError::NotStarted(self.code.clone()));
        }
        if self.expires_at.map_or(false, |end| now >= end) {
            return Err(CouponError::Expired(self.code.clone()));
        }
        if self.usage_limit.map_or(false, |limit| self.used_count >= limit) {
            return Err(CouponError::UsageLimitReached(self.code.clone()));
        }
        if let Some(required) = self.min_order_amount {
            if subtotal < required {
                return Err(CouponError::MinimumNotMet { required });
            }
        }
        Ok(())
    }

    /// Amount taken off `subtotal`, capped by `max_discount` and never above the subtotal.
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        let subtotal = subtotal.max(0);
        let mut discount = subtotal - apply_discount(subtotal, self.discount_type, self.value);
        if let Some(cap) = self.max_discount {
            discount = discount.min(cap.max(0));
        }
        discount.clamp(0, subtotal)
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Admin create/update payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    pub min_order_amount: Option<i64>,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let code = normalize_code(&self.code);
        if !(3..=32).contains(&code.len())
            || !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            errors.add("code", "The code must be 3 to 32 letters, numbers, dashes or underscores.");
        }
        if !self.value.is_finite() || self.value <= 0.0 {
            errors.add("value", "The value must be greater than 0.");
        } else if self.discount_type == DiscountType::Percentage && self.value > 100.0 {
            errors.add("value", "The value may not be greater than 100.");
        }
        if self.min_order_amount.map_or(false, |m| m < 0) {
            errors.add("min_order_amount", "The min order amount must be at least 0.");
        }
        if self.max_discount.map_or(false, |m| m <= 0) {
            errors.add("max_discount", "The max discount must be greater than 0.");
        }
        if self.usage_limit.map_or(false, |u| u < 1) {
            errors.add("usage_limit", "The usage limit must be at least 1.");
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.expires_at) {
            if end <= start {
                errors.add("expires_at", "The expires at must be a date after starts at.");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouponError {
    #[error("Coupon not found: {0}")]
    NotFound(String),

    #[error("Coupon {0} is not active")]
    Inactive(String),

    #[error("Coupon {0} is not valid yet")]
    NotStarted(String),

    #[error("Coupon {0} has expired")]
    Expired(String),

    #[error("Coupon {0} has reached its usage limit")]
    UsageLimitReached(String),

    #[error("Order subtotal must be at least {required} to use this coupon")]
    MinimumNotMet { required: i64 },
}
