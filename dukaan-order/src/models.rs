use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use dukaan_catalog::bundle::BundleSelection;
use dukaan_catalog::StockAdjustments;
use dukaan_shared::validation::{is_valid_email, normalize_phone};
use dukaan_shared::{Masked, ValidationErrors};

use crate::cart::LineComponent;

/// Order status in the fulfilment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            PaymentStatus::Unpaid,
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ]
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    #[serde(rename = "cash_on_delivery")]
    CashOnDelivery,
    #[serde(rename = "jazzcash")]
    JazzCash,
    #[serde(rename = "easypaisa")]
    EasyPaisa,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::JazzCash => "jazzcash",
            PaymentMethod::EasyPaisa => "easypaisa",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash_on_delivery" | "cod" => Some(PaymentMethod::CashOnDelivery),
            "jazzcash" => Some(PaymentMethod::JazzCash),
            "easypaisa" => Some(PaymentMethod::EasyPaisa),
            _ => None,
        }
    }

    /// Wallet payments wait for a gateway callback; COD is collected on delivery.
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match self {
            PaymentMethod::CashOnDelivery => PaymentStatus::Unpaid,
            PaymentMethod::JazzCash | PaymentMethod::EasyPaisa => PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemType {
    Product,
    Bundle,
}

impl OrderItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderItemType::Product => "PRODUCT",
            OrderItemType::Bundle => "BUNDLE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRODUCT" => Some(OrderItemType::Product),
            "BUNDLE" => Some(OrderItemType::Bundle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
}

impl ShippingAddress {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.line1.clone()];
        if let Some(line2) = self.line2.as_ref().filter(|l| !l.trim().is_empty()) {
            lines.push(line2.clone());
        }
        let mut city = self.city.clone();
        if let Some(province) = self.province.as_ref().filter(|p| !p.trim().is_empty()) {
            city = format!("{}, {}", city, province);
        }
        if let Some(code) = self.postal_code.as_ref().filter(|c| !c.trim().is_empty()) {
            city = format!("{} {}", city, code);
        }
        lines.push(city);
        lines
    }
}

/// A purchased line, frozen at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub item_type: OrderItemType,
    pub product_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
    /// Per-bundle contents (quantity is per single bundle).
    #[serde(default)]
    pub components: Vec<LineComponent>,
    #[serde(default)]
    pub selection: BundleSelection,
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub customer: CustomerInfo,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_fee: i64,
    pub total: i64,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity.max(0) as u32).sum()
    }

    /// Stock movement that puts every purchased unit back on the shelf.
    pub fn restock_adjustments(&self) -> StockAdjustments {
        let mut adjustments = StockAdjustments::default();
        for item in &self.items {
            match item.item_type {
                OrderItemType::Product => {
                    if let Some(product_id) = item.product_id {
                        *adjustments.products.entry(product_id).or_default() += item.quantity;
                    }
                }
                OrderItemType::Bundle => {
                    for component in &item.components {
                        *adjustments.products.entry(component.product_id).or_default() +=
                            component.quantity * item.quantity;
                    }
                    if let Some(bundle_id) = item.bundle_id {
                        *adjustments.bundles.entry(bundle_id).or_default() -= item.quantity;
                    }
                }
            }
        }
        adjustments
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Checkout payload posted by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn validate(&self, enabled_methods: &[PaymentMethod]) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.require("name", &self.name, 255);
        errors.require("email", &self.email, 255);
        if !self.email.trim().is_empty() && !is_valid_email(&self.email) {
            errors.add("email", "The email must be a valid email address.");
        }
        errors.require("phone", &self.phone, 32);
        if !self.phone.trim().is_empty() && normalize_phone(&self.phone).is_none() {
            errors.add("phone", "The phone must be 10 to 15 digits.");
        }
        errors.require("address.line1", &self.address.line1, 255);
        errors.require("address.city", &self.address.city, 100);
        if let Some(notes) = &self.notes {
            if notes.chars().count() > 1000 {
                errors.add("notes", "The notes may not be greater than 1000 characters.");
            }
        }
        if !enabled_methods.contains(&self.payment_method) {
            errors.add("payment_method", "The selected payment method is not available.");
        }

        errors.into_result()
    }

    pub fn customer(&self) -> CustomerInfo {
        CustomerInfo {
            name: self.name.trim().to_string(),
            email: Masked(self.email.trim().to_lowercase()),
            phone: Masked(normalize_phone(&self.phone).unwrap_or_else(|| self.phone.trim().to_string())),
        }
    }
}
