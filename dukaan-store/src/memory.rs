//! Process-local storage backend.
//!
//! Every repository shares one [`MemoryState`] behind a single lock, so the
//! multi-table writes that Postgres runs in a transaction (checkout, cancel
//! restock, section reorder) are all-or-nothing here as well.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use dukaan_catalog::{Bundle, HomepageSection, Product, StockAdjustments};
use dukaan_core::identity::{normalize_email, User};
use dukaan_core::repository::{
    BundleRepository, CartRepository, CouponRepository, HomepageRepository, OrderFilter,
    OrderRepository, OrderRevision, OrderStats, PageRequest, Paginated, ProductFilter, ProductRepository,
    StoreResult, UserRepository, VisitRepository,
};
use dukaan_core::StoreError;
use dukaan_order::coupon::normalize_code;
use dukaan_order::{Cart, Coupon, Order, OrderStatus, PaymentStatus, PreparedOrder};
use dukaan_shared::models::events::VisitEvent;

#[derive(Default)]
pub struct MemoryState {
    products: HashMap<Uuid, Product>,
    bundles: HashMap<Uuid, Bundle>,
    coupons: HashMap<Uuid, Coupon>,
    orders: HashMap<Uuid, Order>,
    sections: HashMap<Uuid, HomepageSection>,
    visits: Vec<VisitEvent>,
    users: HashMap<Uuid, User>,
}

impl MemoryState {
    /// Check every delta first, then apply them all.
    fn apply_adjustments(&mut self, adjustments: &StockAdjustments) -> StoreResult<()> {
        for (id, delta) in &adjustments.products {
            let product = self
                .products
                .get(id)
                .ok_or_else(|| StoreError::NotFound(format!("product {}", id)))?;
            if product.stock + delta < 0 {
                return Err(StoreError::InsufficientStock(format!("product {}", id)));
            }
        }
        for (id, delta) in &adjustments.bundles {
            let bundle = self
                .bundles
                .get(id)
                .ok_or_else(|| StoreError::NotFound(format!("bundle {}", id)))?;
            if *delta > 0 && bundle.stock_limit.map_or(false, |limit| bundle.sold_count + delta > limit) {
                return Err(StoreError::InsufficientStock(format!("bundle {}", id)));
            }
        }

        let now = Utc::now();
        for (id, delta) in &adjustments.products {
            if let Some(product) = self.products.get_mut(id) {
                product.stock += delta;
                product.updated_at = now;
            }
        }
        for (id, delta) in &adjustments.bundles {
            if let Some(bundle) = self.bundles.get_mut(id) {
                bundle.sold_count = (bundle.sold_count + delta).max(0);
                bundle.updated_at = now;
            }
        }
        Ok(())
    }
}

pub type SharedState = Arc<RwLock<MemoryState>>;

pub struct MemoryProductRepository {
    state: SharedState,
}

impl MemoryProductRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

fn product_conflict(state: &MemoryState, product: &Product) -> Option<StoreError> {
    state
        .products
        .values()
        .filter(|p| p.id != product.id)
        .find_map(|p| {
            if p.sku == product.sku {
                Some(StoreError::Conflict(format!("sku {} already exists", product.sku)))
            } else if p.slug == product.slug {
                Some(StoreError::Conflict(format!("slug {} already exists", product.slug)))
            } else {
                None
            }
        })
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn list(&self, filter: &ProductFilter, page: PageRequest) -> StoreResult<Paginated<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state.products.values().filter(|p| filter.matches(p)).cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(Paginated::from_vec(products, page))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        Ok(self.state.read().await.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn create(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(err) = product_conflict(&state, product) {
            return Err(err);
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&product.id) {
            return Err(StoreError::NotFound(format!("product {}", product.id)));
        }
        if let Some(err) = product_conflict(&state, product) {
            return Err(err);
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.state
            .write()
            .await
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("product {}", id)))
    }

    async fn set_stock(&self, id: Uuid, stock: i32) -> StoreResult<Product> {
        if stock < 0 {
            return Err(StoreError::Constraint("stock must not be negative".to_string()));
        }
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", id)))?;
        product.stock = stock;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn low_stock(&self, threshold: i32) -> StoreResult<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_active && p.stock <= threshold)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        Ok(products)
    }
}

pub struct MemoryBundleRepository {
    state: SharedState,
}

impl MemoryBundleRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BundleRepository for MemoryBundleRepository {
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<Bundle>> {
        let state = self.state.read().await;
        let mut bundles: Vec<Bundle> = state
            .bundles
            .values()
            .filter(|b| include_inactive || b.is_active)
            .cloned()
            .collect();
        bundles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(bundles)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Bundle>> {
        Ok(self.state.read().await.bundles.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Bundle>> {
        Ok(self.state.read().await.bundles.values().find(|b| b.slug == slug).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Bundle>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.bundles.get(id).cloned()).collect())
    }

    async fn create(&self, bundle: &Bundle) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.bundles.values().any(|b| b.slug == bundle.slug) {
            return Err(StoreError::Conflict(format!("slug {} already exists", bundle.slug)));
        }
        state.bundles.insert(bundle.id, bundle.clone());
        Ok(())
    }

    async fn update(&self, bundle: &Bundle) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.bundles.contains_key(&bundle.id) {
            return Err(StoreError::NotFound(format!("bundle {}", bundle.id)));
        }
        if state.bundles.values().any(|b| b.id != bundle.id && b.slug == bundle.slug) {
            return Err(StoreError::Conflict(format!("slug {} already exists", bundle.slug)));
        }
        state.bundles.insert(bundle.id, bundle.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.state
            .write()
            .await
            .bundles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("bundle {}", id)))
    }
}

pub struct MemoryCouponRepository {
    state: SharedState,
}

impl MemoryCouponRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl CouponRepository for MemoryCouponRepository {
    async fn list(&self) -> StoreResult<Vec<Coupon>> {
        let state = self.state.read().await;
        let mut coupons: Vec<Coupon> = state.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Coupon>> {
        Ok(self.state.read().await.coupons.get(&id).cloned())
    }

    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let code = normalize_code(code);
        Ok(self.state.read().await.coupons.values().find(|c| c.code == code).cloned())
    }

    async fn create(&self, coupon: &Coupon) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.coupons.values().any(|c| c.code == coupon.code) {
            return Err(StoreError::Conflict(format!("coupon {} already exists", coupon.code)));
        }
        state.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn update(&self, coupon: &Coupon) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let used_count = match state.coupons.get(&coupon.id) {
            Some(existing) => existing.used_count,
            None => return Err(StoreError::NotFound(format!("coupon {}", coupon.id))),
        };
        if state.coupons.values().any(|c| c.id != coupon.id && c.code == coupon.code) {
            return Err(StoreError::Conflict(format!("coupon {} already exists", coupon.code)));
        }
        // usage is only ever counted by checkout
        let mut updated = coupon.clone();
        updated.used_count = used_count;
        state.coupons.insert(coupon.id, updated);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.state
            .write()
            .await
            .coupons
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("coupon {}", id)))
    }
}

pub struct MemoryOrderRepository {
    state: SharedState,
}

impl MemoryOrderRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create(&self, prepared: &PreparedOrder) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let order = &prepared.order;

        if state.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Conflict(format!("order number {} already exists", order.order_number)));
        }
        if let Some(coupon_id) = prepared.coupon_id {
            let coupon = state
                .coupons
                .get(&coupon_id)
                .ok_or_else(|| StoreError::NotFound(format!("coupon {}", coupon_id)))?;
            if coupon.usage_limit.map_or(false, |limit| coupon.used_count >= limit) {
                return Err(StoreError::Conflict("coupon usage limit reached".to_string()));
            }
        }

        state.apply_adjustments(&prepared.adjustments)?;
        if let Some(coupon) = prepared.coupon_id.and_then(|id| state.coupons.get_mut(&id)) {
            coupon.used_count += 1;
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> StoreResult<Paginated<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Paginated::from_vec(orders, page))
    }

    async fn update(
        &self,
        order: &Order,
        expected: OrderRevision,
        restock: Option<&StockAdjustments>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.orders.get(&order.id) {
            None => return Err(StoreError::NotFound(format!("order {}", order.id))),
            Some(stored) if !expected.matches(stored) => {
                return Err(StoreError::Conflict(format!(
                    "order {} was changed by another request",
                    order.id
                )));
            }
            Some(_) => {}
        }
        if let Some(adjustments) = restock {
            state.apply_adjustments(adjustments)?;
        }
        if let Some(stored) = state.orders.get_mut(&order.id) {
            stored.status = order.status;
            stored.payment_status = order.payment_status;
            stored.payment_reference = order.payment_reference.clone();
            stored.notes = order.notes.clone();
            stored.updated_at = order.updated_at;
        }
        Ok(())
    }

    async fn stats(&self, since: DateTime<Utc>) -> StoreResult<OrderStats> {
        let state = self.state.read().await;
        let mut stats = OrderStats {
            by_status: OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect(),
            ..Default::default()
        };
        for order in state.orders.values() {
            stats.total_orders += 1;
            *stats.by_status.entry(order.status.as_str().to_string()).or_insert(0) += 1;
            let paid = order.payment_status == PaymentStatus::Paid;
            if paid {
                stats.revenue += order.total;
            }
            if order.created_at >= since {
                stats.orders_since += 1;
                if paid {
                    stats.revenue_since += order.total;
                }
            }
        }
        Ok(stats)
    }
}

pub struct MemoryHomepageRepository {
    state: SharedState,
}

impl MemoryHomepageRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl HomepageRepository for MemoryHomepageRepository {
    async fn list(&self) -> StoreResult<Vec<HomepageSection>> {
        let state = self.state.read().await;
        let mut sections: Vec<HomepageSection> = state.sections.values().cloned().collect();
        sections.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.created_at.cmp(&b.created_at)));
        Ok(sections)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<HomepageSection>> {
        Ok(self.state.read().await.sections.get(&id).cloned())
    }

    async fn create(&self, section: &HomepageSection) -> StoreResult<()> {
        self.state.write().await.sections.insert(section.id, section.clone());
        Ok(())
    }

    async fn update(&self, section: &HomepageSection) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.sections.get_mut(&section.id) {
            Some(stored) => {
                *stored = section.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("section {}", section.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.state
            .write()
            .await
            .sections
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("section {}", id)))
    }

    async fn reorder(&self, ids: &[Uuid]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(missing) = ids.iter().find(|id| !state.sections.contains_key(id)) {
            return Err(StoreError::NotFound(format!("section {}", missing)));
        }
        let now = Utc::now();
        for (position, id) in ids.iter().enumerate() {
            if let Some(section) = state.sections.get_mut(id) {
                section.position = position as i32;
                section.updated_at = now;
            }
        }
        Ok(())
    }
}

pub struct MemoryVisitRepository {
    state: SharedState,
}

impl MemoryVisitRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl VisitRepository for MemoryVisitRepository {
    async fn record(&self, visit: &VisitEvent) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.visits.iter().any(|v| v.id == visit.id) {
            state.visits.push(visit.clone());
        }
        Ok(())
    }

    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>> {
        let state = self.state.read().await;
        let mut visits: Vec<VisitEvent> = state
            .visits
            .iter()
            .filter(|v| v.occurred_at >= from && v.occurred_at < to)
            .cloned()
            .collect();
        visits.sort_by_key(|v| v.occurred_at);
        Ok(visits)
    }
}

pub struct MemoryUserRepository {
    state: SharedState,
}

impl MemoryUserRepository {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self.state.read().await.users.values().find(|u| u.email == email).cloned())
    }
}

/// Carts kept in process memory, dropped once they go `ttl` without a save.
pub struct MemoryCartRepository {
    carts: RwLock<HashMap<String, (Cart, DateTime<Utc>)>>,
    ttl: Duration,
}

impl MemoryCartRepository {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            carts: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds.min(i64::MAX as u64) as i64),
        }
    }
}

#[async_trait]
impl CartRepository for MemoryCartRepository {
    async fn get(&self, key: &str) -> StoreResult<Option<Cart>> {
        let now = Utc::now();
        let mut carts = self.carts.write().await;
        match carts.get(key) {
            Some((cart, expires_at)) if *expires_at > now => Ok(Some(cart.clone())),
            Some(_) => {
                carts.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, cart: &Cart) -> StoreResult<()> {
        let expires_at = Utc::now() + self.ttl;
        self.carts.write().await.insert(cart.key.clone(), (cart.clone(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.carts.write().await.remove(key);
        Ok(())
    }
}
