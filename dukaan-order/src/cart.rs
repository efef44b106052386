use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use dukaan_catalog::bundle::{normalize_selection, Bundle, BundleSelection};
use dukaan_catalog::pricing::DiscountType;
use dukaan_catalog::Product;

use crate::coupon::Coupon;
use crate::shipping::ShippingPolicy;

pub const MAX_LINE_QUANTITY: i32 = 99;
pub const MAX_LINES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineKind {
    Product {
        product_id: Uuid,
    },
    Bundle {
        bundle_id: Uuid,
        #[serde(default)]
        selection: BundleSelection,
    },
}

/// One row of a cart (a `CartItem` on the storefront).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: LineKind,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub key: String,
    pub lines: Vec<CartLine>,
    pub coupon_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            lines: Vec::new(),
            coupon_code: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    fn check_quantity(quantity: i32) -> Result<(), CartError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CartError::InvalidQuantity(quantity));
        }
        Ok(())
    }

    fn push_or_merge(&mut self, kind: LineKind, quantity: i32) -> Result<Uuid, CartError> {
        Self::check_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.kind == kind) {
            let merged = line.quantity + quantity;
            Self::check_quantity(merged)?;
            line.quantity = merged;
            self.updated_at = Utc::now();
            return Ok(line.id);
        }

        if self.lines.len() >= MAX_LINES {
            return Err(CartError::TooManyLines(MAX_LINES));
        }

        let line = CartLine {
            id: Uuid::new_v4(),
            kind,
            quantity,
            added_at: Utc::now(),
        };
        let id = line.id;
        self.lines.push(line);
        self.updated_at = Utc::now();
        Ok(id)
    }

    /// Add a product, merging with an existing line for the same product.
    pub fn add_product(&mut self, product_id: Uuid, quantity: i32) -> Result<Uuid, CartError> {
        self.push_or_merge(LineKind::Product { product_id }, quantity)
    }

    /// Add a bundle; lines merge only when the slot picks are identical.
    pub fn add_bundle(
        &mut self,
        bundle_id: Uuid,
        selection: &BundleSelection,
        quantity: i32,
    ) -> Result<Uuid, CartError> {
        let selection = normalize_selection(selection);
        self.push_or_merge(LineKind::Bundle { bundle_id, selection }, quantity)
    }

    /// Set a line's quantity; zero removes the line.
    pub fn update_quantity(&mut self, line_id: Uuid, quantity: i32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(line_id);
        }
        Self::check_quantity(quantity)?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(CartError::LineNotFound(line_id))?;
        line.quantity = quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn remove(&mut self, line_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound(line_id));
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.coupon_code = None;
        self.updated_at = Utc::now();
    }

    pub fn apply_coupon(&mut self, code: &str) {
        self.coupon_code = Some(crate::coupon::normalize_code(code));
        self.updated_at = Utc::now();
    }

    pub fn remove_coupon(&mut self) {
        self.coupon_code = None;
        self.updated_at = Utc::now();
    }

    /// Fold another cart (typically a guest cart at login) into this one.
    ///
    /// Quantities of matching lines add up and are capped at the per-line maximum;
    /// the other cart's coupon is kept only if this cart has none.
    pub fn merge(&mut self, other: Cart) {
        for line in other.lines {
            if let Some(existing) = self.lines.iter_mut().find(|l| l.kind == line.kind) {
                existing.quantity = (existing.quantity + line.quantity).min(MAX_LINE_QUANTITY);
            } else if self.lines.len() < MAX_LINES {
                self.lines.push(line);
            }
        }
        if self.coupon_code.is_none() {
            self.coupon_code = other.coupon_code;
        }
        self.updated_at = Utc::now();
    }
}

/// The slice of the catalog a cart refers to.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub products: HashMap<Uuid, Product>,
    pub bundles: HashMap<Uuid, Bundle>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>, bundles: Vec<Bundle>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            bundles: bundles.into_iter().map(|b| (b.id, b)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineComponent {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedLine {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: LineKind,
    pub name: String,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub original_unit_price: i64,
    pub unit_price: i64,
    pub line_total: i64,
    pub available: bool,
    pub max_quantity: Option<i32>,
    pub message: Option<String>,
    pub components: Vec<LineComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    pub discount: i64,
}

/// A cart re-priced against the current catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedCart {
    pub key: String,
    pub lines: Vec<PricedLine>,
    pub item_count: i32,
    pub subtotal: i64,
    pub discount: i64,
    pub shipping: i64,
    pub total: i64,
    pub currency: String,
    pub coupon: Option<AppliedCoupon>,
    pub coupon_code: Option<String>,
    pub coupon_error: Option<String>,
    pub warnings: Vec<String>,
}

impl PricedCart {
    pub fn has_unavailable_lines(&self) -> bool {
        self.lines.iter().any(|l| !l.available)
    }
}

pub struct CartPricer {
    shipping: ShippingPolicy,
    currency: String,
}

impl CartPricer {
    pub fn new(shipping: ShippingPolicy, currency: impl Into<String>) -> Self {
        Self {
            shipping,
            currency: currency.into(),
        }
    }

    pub fn shipping(&self) -> &ShippingPolicy {
        &self.shipping
    }

    /// Price every line from the snapshot, then apply the coupon and shipping.
    ///
    /// `coupon` is the coupon looked up for `cart.coupon_code`, if it exists.
    pub fn price(
        &self,
        cart: &Cart,
        catalog: &CatalogSnapshot,
        coupon: Option<&Coupon>,
        now: DateTime<Utc>,
    ) -> PricedCart {
        let mut warnings = Vec::new();
        let lines: Vec<PricedLine> = cart
            .lines
            .iter()
            .map(|line| self.price_line(line, catalog, now))
            .collect();

        for line in &lines {
            if let Some(message) = &line.message {
                warnings.push(format!("{}: {}", line.name, message));
            }
        }

        let subtotal: i64 = lines.iter().filter(|l| l.available).map(|l| l.line_total).sum();
        let item_count: i32 = lines.iter().filter(|l| l.available).map(|l| l.quantity).sum();

        let mut applied = None;
        let mut coupon_error = None;
        match (&cart.coupon_code, coupon) {
            (Some(code), None) => coupon_error = Some(format!("Coupon {} does not exist", code)),
            (Some(_), Some(coupon)) => match coupon.validate_for(subtotal, now) {
                Ok(()) => {
                    applied = Some(AppliedCoupon {
                        code: coupon.code.clone(),
                        discount_type: coupon.discount_type,
                        value: coupon.value,
                        discount: coupon.discount_for(subtotal),
                    });
                }
                Err(e) => coupon_error = Some(e.to_string()),
            },
            (None, _) => {}
        }

        let discount = applied.as_ref().map_or(0, |c| c.discount);
        let after_discount = (subtotal - discount).max(0);
        let shipping = self.shipping.fee_for(after_discount, item_count > 0);

        PricedCart {
            key: cart.key.clone(),
            lines,
            item_count,
            subtotal,
            discount,
            shipping,
            total: after_discount + shipping,
            currency: self.currency.clone(),
            coupon: applied,
            coupon_code: cart.coupon_code.clone(),
            coupon_error,
            warnings,
        }
    }

    fn price_line(&self, line: &CartLine, catalog: &CatalogSnapshot, now: DateTime<Utc>) -> PricedLine {
        let unavailable = |name: String, message: &str| PricedLine {
            id: line.id,
            kind: line.kind.clone(),
            name,
            sku: None,
            image_url: None,
            quantity: line.quantity,
            original_unit_price: 0,
            unit_price: 0,
            line_total: 0,
            available: false,
            max_quantity: Some(0),
            message: Some(message.to_string()),
            components: Vec::new(),
        };

        match &line.kind {
            LineKind::Product { product_id } => {
                let Some(product) = catalog.products.get(product_id) else {
                    return unavailable("Removed product".to_string(), "no longer sold");
                };
                if !product.is_purchasable() {
                    return unavailable(product.name.clone(), "out of stock");
                }
                let unit_price = product.effective_price();
                let message = (line.quantity > product.stock)
                    .then(|| format!("only {} left in stock", product.stock));
                PricedLine {
                    id: line.id,
                    kind: line.kind.clone(),
                    name: product.name.clone(),
                    sku: Some(product.sku.clone()),
                    image_url: product.image_url.clone(),
                    quantity: line.quantity,
                    original_unit_price: product.price,
                    unit_price,
                    line_total: unit_price * line.quantity as i64,
                    available: true,
                    max_quantity: Some(product.stock.min(MAX_LINE_QUANTITY)),
                    message,
                    components: Vec::new(),
                }
            }
            LineKind::Bundle { bundle_id, selection } => {
                let Some(bundle) = catalog.bundles.get(bundle_id) else {
                    return unavailable("Removed bundle".to_string(), "no longer sold");
                };
                if !bundle.is_available(now, &catalog.products) {
                    return unavailable(bundle.name.clone(), "no longer available");
                }
                let price = match bundle.price_for(selection, &catalog.products) {
                    Ok(price) => price,
                    Err(e) => return unavailable(bundle.name.clone(), &e.to_string()),
                };

                let components: Vec<LineComponent> = bundle
                    .components(selection)
                    .into_iter()
                    .map(|(product_id, quantity)| LineComponent {
                        product_id,
                        name: catalog
                            .products
                            .get(&product_id)
                            .map(|p| p.name.clone())
                            .unwrap_or_default(),
                        quantity,
                    })
                    .collect();

                let component_cap = components
                    .iter()
                    .map(|c| {
                        catalog
                            .products
                            .get(&c.product_id)
                            .map_or(0, |p| p.stock.max(0) / c.quantity.max(1))
                    })
                    .min();
                let cap = match (bundle.limit_remaining(), component_cap) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                let message = cap
                    .filter(|c| line.quantity > *c)
                    .map(|c| format!("only {} left", c));

                PricedLine {
                    id: line.id,
                    kind: line.kind.clone(),
                    name: bundle.name.clone(),
                    sku: None,
                    image_url: bundle.image_url.clone(),
                    quantity: line.quantity,
                    original_unit_price: price.original,
                    unit_price: price.discounted,
                    line_total: price.discounted * line.quantity as i64,
                    available: true,
                    max_quantity: cap.map(|c| c.min(MAX_LINE_QUANTITY)),
                    message,
                    components,
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be between 1 and {max}, got {0}", max = MAX_LINE_QUANTITY)]
    InvalidQuantity(i32),

    #[error("Cart line not found: {0}")]
    LineNotFound(Uuid),

    #[error("A cart can hold at most {0} lines")]
    TooManyLines(usize),

    #[error("Cart is empty")]
    Empty,
}
