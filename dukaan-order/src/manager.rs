use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;
use dukaan_catalog::{InventoryError, StockAdjustments, StockLedger};
use dukaan_shared::ValidationErrors;

use crate::cart::{Cart, CartPricer, CatalogSnapshot, LineKind, PricedCart};
use crate::coupon::Coupon;
use crate::models::{
    CheckoutRequest, Order, OrderItem, OrderItemType, OrderStatus, PaymentMethod, PaymentStatus,
};

/// An order ready to be persisted together with its side effects.
#[derive(Debug, Clone)]
pub struct PreparedOrder {
    pub order: Order,
    pub adjustments: StockAdjustments,
    /// Coupon whose usage count must be incremented with the order.
    pub coupon_id: Option<Uuid>,
}

/// Result of a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Stock to put back when the order was cancelled.
    pub restock: Option<StockAdjustments>,
}

/// Builds orders from carts and enforces the order lifecycle
pub struct OrderManager {
    pricer: CartPricer,
    enabled_methods: Vec<PaymentMethod>,
}

impl OrderManager {
    pub fn new(pricer: CartPricer, enabled_methods: Vec<PaymentMethod>) -> Self {
        Self {
            pricer,
            enabled_methods,
        }
    }

    pub fn pricer(&self) -> &CartPricer {
        &self.pricer
    }

    pub fn enabled_methods(&self) -> &[PaymentMethod] {
        &self.enabled_methods
    }

    /// Turn a cart into an order.
    ///
    /// The cart is re-priced against `catalog`; every line must still be
    /// available and all stock is reserved through a single ledger so a
    /// partially fulfillable cart is rejected as a whole.
    pub fn checkout(
        &self,
        cart: &Cart,
        catalog: &CatalogSnapshot,
        coupon: Option<&Coupon>,
        request: &CheckoutRequest,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PreparedOrder, OrderError> {
        request
            .validate(&self.enabled_methods)
            .map_err(OrderError::Invalid)?;

        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let priced = self.pricer.price(cart, catalog, coupon, now);
        if priced.has_unavailable_lines() {
            let names = priced
                .lines
                .iter()
                .filter(|l| !l.available)
                .map(|l| l.name.clone())
                .collect();
            return Err(OrderError::UnavailableItems(names));
        }
        if let Some(message) = &priced.coupon_error {
            return Err(OrderError::CouponRejected(message.clone()));
        }

        let mut ledger = StockLedger::new(&catalog.products);
        for line in &cart.lines {
            match &line.kind {
                LineKind::Product { product_id } => ledger.reserve_product(product_id, line.quantity)?,
                LineKind::Bundle { bundle_id, selection } => {
                    let bundle = catalog
                        .bundles
                        .get(bundle_id)
                        .ok_or_else(|| OrderError::UnavailableItems(vec![bundle_id.to_string()]))?;
                    ledger.reserve_bundle(bundle, selection, line.quantity)?;
                }
            }
        }

        let order = self.build_order(&priced, request, user_id, now);
        let coupon_id = priced.coupon.as_ref().and(coupon.map(|c| c.id));

        Ok(PreparedOrder {
            order,
            adjustments: ledger.into_adjustments(),
            coupon_id,
        })
    }

    fn build_order(
        &self,
        priced: &PricedCart,
        request: &CheckoutRequest,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Order {
        let items = priced
            .lines
            .iter()
            .map(|line| {
                let (item_type, product_id, bundle_id, selection) = match &line.kind {
                    LineKind::Product { product_id } => {
                        (OrderItemType::Product, Some(*product_id), None, Default::default())
                    }
                    LineKind::Bundle { bundle_id, selection } => {
                        (OrderItemType::Bundle, None, Some(*bundle_id), selection.clone())
                    }
                };
                OrderItem {
                    id: Uuid::new_v4(),
                    item_type,
                    product_id,
                    bundle_id,
                    name: line.name.clone(),
                    sku: line.sku.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    line_total: line.line_total,
                    components: line.components.clone(),
                    selection,
                }
            })
            .collect();

        Order {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now),
            user_id,
            customer: request.customer(),
            shipping_address: request.address.clone(),
            items,
            subtotal: priced.subtotal,
            discount: priced.discount,
            shipping_fee: priced.shipping,
            total: priced.total,
            currency: priced.currency.clone(),
            coupon_code: priced.coupon.as_ref().map(|c| c.code.clone()),
            payment_method: request.payment_method,
            payment_status: request.payment_method.initial_payment_status(),
            payment_reference: None,
            status: OrderStatus::Pending,
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            access_token: generate_token(32),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move an order to `to`, validating against the status machine.
    ///
    /// Delivering a COD order marks it paid; cancelling returns the stock and
    /// flags a captured payment for refund.
    pub fn transition(&self, order: &mut Order, to: OrderStatus) -> Result<StatusChange, OrderError> {
        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let mut restock = None;
        match to {
            OrderStatus::Delivered if order.payment_method == PaymentMethod::CashOnDelivery => {
                order.payment_status = PaymentStatus::Paid;
            }
            OrderStatus::Cancelled => {
                restock = Some(order.restock_adjustments());
                order.payment_status = match order.payment_status {
                    PaymentStatus::Paid => PaymentStatus::Refunded,
                    PaymentStatus::Pending => PaymentStatus::Failed,
                    other => other,
                };
            }
            _ => {}
        }

        order.status = to;
        order.updated_at = Utc::now();
        Ok(StatusChange { from, to, restock })
    }

    /// Manual payment status change from the admin panel.
    pub fn set_payment_status(
        &self,
        order: &mut Order,
        status: PaymentStatus,
        reference: Option<String>,
    ) -> Result<(), OrderError> {
        let allowed = match (order.payment_status, status) {
            (a, b) if a == b => true,
            (PaymentStatus::Refunded, _) => false,
            (_, PaymentStatus::Refunded) => order.payment_status == PaymentStatus::Paid,
            (_, PaymentStatus::Paid) => order.status != OrderStatus::Cancelled,
            _ => true,
        };
        if !allowed {
            return Err(OrderError::InvalidPaymentTransition {
                from: order.payment_status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        order.payment_status = status;
        if reference.is_some() {
            order.payment_reference = reference;
        }
        order.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a verified gateway callback.
    ///
    /// A successful payment confirms a pending order. Returns `false` when the
    /// callback changed nothing (a replay of an already-applied outcome).
    pub fn record_payment(
        &self,
        order: &mut Order,
        succeeded: bool,
        reference: Option<String>,
    ) -> Result<bool, OrderError> {
        if order.payment_status == PaymentStatus::Paid {
            return Ok(false);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::InvalidPaymentTransition {
                from: order.status.as_str().to_string(),
                to: PaymentStatus::Paid.as_str().to_string(),
            });
        }

        if succeeded {
            self.set_payment_status(order, PaymentStatus::Paid, reference)?;
            if order.status == OrderStatus::Pending {
                order.status = OrderStatus::Confirmed;
            }
        } else {
            self.set_payment_status(order, PaymentStatus::Failed, reference)?;
        }
        Ok(true)
    }
}

/// `ORD-YYYYMMDD-XXXXXX` with an upper-case alphanumeric suffix.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    format!(
        "ORD-{}-{}",
        now.format("%Y%m%d"),
        generate_token(6).to_ascii_uppercase()
    )
}

pub fn generate_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Payment status cannot change from {from} to {to}")]
    InvalidPaymentTransition {
        from: String,
        to: String,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Some items are no longer available: {}", .0.join(", "))]
    UnavailableItems(Vec<String>),

    #[error("Coupon rejected: {0}")]
    CouponRejected(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Invalid checkout: {0}")]
    Invalid(ValidationErrors),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::CouponInput;
    use crate::models::ShippingAddress;
    use crate::shipping::ShippingPolicy;
    use dukaan_catalog::bundle::{BundleInput, BundleItem, BundleType};
    use dukaan_catalog::pricing::DiscountType;
    use dukaan_catalog::{Bundle, BundleSelection, Product, ProductInput};

    fn product(sku: &str, price: i64, stock: i32) -> Product {
        Product::from_input(ProductInput {
            sku: sku.to_string(),
            name: sku.to_string(),
            slug: None,
            description: None,
            category: None,
            price,
            sale_price: None,
            stock,
            is_active: None,
            image_url: None,
        })
    }

    fn manager() -> OrderManager {
        OrderManager::new(
            CartPricer::new(ShippingPolicy { flat_fee: 20_000, free_threshold: Some(300_000) }, "PKR"),
            vec![PaymentMethod::CashOnDelivery, PaymentMethod::JazzCash],
        )
    }

    fn request(method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            name: "Bilal Ahmed".to_string(),
            email: "bilal@example.pk".to_string(),
            phone: "03001234567".to_string(),
            address: ShippingAddress {
                line1: "12 Mall Road".to_string(),
                line2: None,
                city: "Lahore".to_string(),
                province: None,
                postal_code: None,
            },
            payment_method: method,
            notes: Some("  ".to_string()),
        }
    }

    fn tea_set(tea: &Product, cup: &Product) -> Bundle {
        Bundle::from_input(BundleInput {
            name: "Tea Set".to_string(),
            slug: None,
            description: None,
            bundle_type: BundleType::Fixed,
            discount_type: DiscountType::Percentage,
            discount_value: 10.0,
            starts_at: None,
            ends_at: None,
            stock_limit: Some(5),
            is_active: None,
            image_url: None,
            items: vec![
                BundleItem { product_id: tea.id, quantity: 1 },
                BundleItem { product_id: cup.id, quantity: 2 },
            ],
            slots: vec![],
        })
    }

    #[test]
    fn test_checkout_builds_order_and_adjustments() {
        let tea = product("TEA", 100_000, 10);
        let cup = product("CUP", 25_000, 10);
        let bundle = tea_set(&tea, &cup);
        let catalog = CatalogSnapshot::new(vec![tea.clone(), cup.clone()], vec![bundle.clone()]);

        let mut cart = Cart::new("guest-1");
        cart.add_product(tea.id, 1).unwrap();
        cart.add_bundle(bundle.id, &BundleSelection::new(), 2).unwrap();

        let prepared = manager()
            .checkout(&cart, &catalog, None, &request(PaymentMethod::CashOnDelivery), None, Utc::now())
            .unwrap();
        let order = &prepared.order;

        // bundle: (100_000 + 2 * 25_000) * 0.9 = 135_000
        assert_eq!(order.subtotal, 100_000 + 2 * 135_000);
        assert_eq!(order.shipping_fee, 0);
        assert_eq!(order.total, order.subtotal);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.order_number.len(), "ORD-20250101-ABC123".len());
        assert_eq!(order.access_token.len(), 32);
        assert!(order.notes.is_none());

        assert_eq!(prepared.adjustments.products[&tea.id], -3);
        assert_eq!(prepared.adjustments.products[&cup.id], -4);
        assert_eq!(prepared.adjustments.bundles[&bundle.id], 2);

        // cancelling puts the same units back
        assert_eq!(order.restock_adjustments(), prepared.adjustments.inverted());
    }

    #[test]
    fn test_checkout_rejects_oversold_cart() {
        let tea = product("TEA", 100_000, 2);
        let cup = product("CUP", 25_000, 10);
        let bundle = tea_set(&tea, &cup);
        let catalog = CatalogSnapshot::new(vec![tea.clone(), cup.clone()], vec![bundle.clone()]);

        let mut cart = Cart::new("guest-1");
        cart.add_product(tea.id, 2).unwrap();
        cart.add_bundle(bundle.id, &BundleSelection::new(), 1).unwrap();

        let err = manager()
            .checkout(&cart, &catalog, None, &request(PaymentMethod::CashOnDelivery), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, OrderError::Inventory(InventoryError::InsufficientStock { .. })));
    }

    #[test]
    fn test_checkout_rejects_empty_cart_and_disabled_method() {
        let catalog = CatalogSnapshot::default();
        let cart = Cart::new("guest-1");
        let err = manager()
            .checkout(&cart, &catalog, None, &request(PaymentMethod::CashOnDelivery), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyCart));

        let err = manager()
            .checkout(&cart, &catalog, None, &request(PaymentMethod::EasyPaisa), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, OrderError::Invalid(ref e) if e.has("payment_method")));
    }

    #[test]
    fn test_checkout_with_coupon_records_usage() {
        let tea = product("TEA", 100_000, 10);
        let catalog = CatalogSnapshot::new(vec![tea.clone()], vec![]);
        let coupon = Coupon::from_input(CouponInput {
            code: "EID500".to_string(),
            discount_type: DiscountType::Fixed,
            value: 50_000.0,
            min_order_amount: None,
            max_discount: None,
            usage_limit: Some(1),
            starts_at: None,
            expires_at: None,
            is_active: None,
        });

        let mut cart = Cart::new("guest-1");
        cart.add_product(tea.id, 1).unwrap();
        cart.apply_coupon("eid500");

        let prepared = manager()
            .checkout(&cart, &catalog, Some(&coupon), &request(PaymentMethod::JazzCash), None, Utc::now())
            .unwrap();
        assert_eq!(prepared.coupon_id, Some(coupon.id));
        assert_eq!(prepared.order.discount, 50_000);
        assert_eq!(prepared.order.shipping_fee, 20_000);
        assert_eq!(prepared.order.total, 70_000);
        assert_eq!(prepared.order.coupon_code.as_deref(), Some("EID500"));
        assert_eq!(prepared.order.payment_status, PaymentStatus::Pending);

        let mut used = coupon.clone();
        used.used_count = 1;
        let err = manager()
            .checkout(&cart, &catalog, Some(&used), &request(PaymentMethod::JazzCash), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, OrderError::CouponRejected(_)));
    }

    #[test]
    fn test_lifecycle_and_cod_payment() {
        let tea = product("TEA", 100_000, 10);
        let catalog = CatalogSnapshot::new(vec![tea.clone()], vec![]);
        let mut cart = Cart::new("guest-1");
        cart.add_product(tea.id, 1).unwrap();

        let manager = manager();
        let mut order = manager
            .checkout(&cart, &catalog, None, &request(PaymentMethod::CashOnDelivery), None, Utc::now())
            .unwrap()
            .order;

        assert!(manager.transition(&mut order, OrderStatus::Shipped).is_err());
        for next in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped] {
            let change = manager.transition(&mut order, next).unwrap();
            assert!(change.restock.is_none());
        }
        assert!(manager.transition(&mut order, OrderStatus::Cancelled).is_err());

        manager.transition(&mut order, OrderStatus::Delivered).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_cancel_restocks_and_refunds() {
        let tea = product("TEA", 100_000, 10);
        let catalog = CatalogSnapshot::new(vec![tea.clone()], vec![]);
        let mut cart = Cart::new("guest-1");
        cart.add_product(tea.id, 3).unwrap();

        let manager = manager();
        let mut order = manager
            .checkout(&cart, &catalog, None, &request(PaymentMethod::JazzCash), None, Utc::now())
            .unwrap()
            .order;

        assert!(manager.record_payment(&mut order, true, Some("T123".to_string())).unwrap());
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_reference.as_deref(), Some("T123"));
        // replayed callback
        assert!(!manager.record_payment(&mut order, true, None).unwrap());

        let change = manager.transition(&mut order, OrderStatus::Cancelled).unwrap();
        assert_eq!(change.restock.unwrap().products[&tea.id], 3);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert!(manager.set_payment_status(&mut order, PaymentStatus::Paid, None).is_err());
    }
}
