use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use dukaan_catalog::{Bundle, HomepageSection, Product};
use dukaan_order::{Cart, Coupon, Order, OrderStatus, PaymentStatus, PreparedOrder};
use dukaan_catalog::StockAdjustments;
use dukaan_shared::models::events::VisitEvent;

use crate::identity::User;

/// Failures reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid stored data: {0}")]
    Decode(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Internal(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based page request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    pub fn limit(&self) -> u64 {
        self.per_page as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: PageRequest,
}

impl<T> Paginated<T> {
    /// Slice an already-filtered, already-sorted list.
    pub fn from_vec(all: Vec<T>, page: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Self { items, total, page }
    }

    pub fn last_page(&self) -> u64 {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.page.per_page as u64)
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub on_sale: Option<bool>,
    pub include_inactive: bool,
    /// Only products whose stock is at or below this level.
    pub max_stock: Option<i32>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.is_active {
            return false;
        }
        if let Some(category) = &self.category {
            if product.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = product.name.to_lowercase().contains(&needle)
                || product.sku.to_lowercase().contains(&needle)
                || product
                    .description
                    .as_deref()
                    .map_or(false, |d| d.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(on_sale) = self.on_sale {
            if product.is_on_sale() != on_sale {
                return false;
            }
        }
        if let Some(max) = self.max_stock {
            if product.stock > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.user_id.map_or(true, |u| order.user_id == Some(u))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderStats {
    pub total_orders: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Sum of totals over paid orders.
    pub revenue: i64,
    pub orders_since: u64,
    pub revenue_since: i64,
}

/// Repository trait for product catalog access
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self, filter: &ProductFilter, page: PageRequest) -> StoreResult<Paginated<Product>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>>;

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Product>>;

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;

    /// Fails with `Conflict` when the SKU or slug is taken.
    async fn create(&self, product: &Product) -> StoreResult<()>;

    async fn update(&self, product: &Product) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn set_stock(&self, id: Uuid, stock: i32) -> StoreResult<Product>;

    async fn low_stock(&self, threshold: i32) -> StoreResult<Vec<Product>>;
}

/// Repository trait for bundle access
#[async_trait]
pub trait BundleRepository: Send + Sync {
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<Bundle>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Bundle>>;

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Bundle>>;

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Bundle>>;

    async fn create(&self, bundle: &Bundle) -> StoreResult<()>;

    async fn update(&self, bundle: &Bundle) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Coupon>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Coupon>>;

    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn create(&self, coupon: &Coupon) -> StoreResult<()>;

    async fn update(&self, coupon: &Coupon) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// The status pair an order change was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRevision {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl OrderRevision {
    pub fn of(order: &Order) -> Self {
        Self {
            status: order.status,
            payment_status: order.payment_status,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        *self == Self::of(order)
    }
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the order, apply its stock adjustments and count the coupon use
    /// as one unit of work.
    async fn create(&self, prepared: &PreparedOrder) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;

    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> StoreResult<Paginated<Order>>;

    /// Save status and payment fields, putting `restock` back on the shelf in the same unit of work.
    ///
    /// The write only lands while the stored order still matches `expected`;
    /// otherwise nothing changes and [`StoreError::Conflict`] is returned.
    async fn update(
        &self,
        order: &Order,
        expected: OrderRevision,
        restock: Option<&StockAdjustments>,
    ) -> StoreResult<()>;

    async fn stats(&self, since: DateTime<Utc>) -> StoreResult<OrderStats>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Cart>>;

    async fn save(&self, cart: &Cart) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait HomepageRepository: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<HomepageSection>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<HomepageSection>>;

    async fn create(&self, section: &HomepageSection) -> StoreResult<()>;

    async fn update(&self, section: &HomepageSection) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Assign positions 0..n in the given order. Every id must exist.
    async fn reorder(&self, ids: &[Uuid]) -> StoreResult<()>;
}

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn record(&self, visit: &VisitEvent) -> StoreResult<()>;

    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create(&self, user: &User) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_bounds() {
        let page = PageRequest::new(Some(0), Some(500));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, PageRequest::MAX_PER_PAGE);

        let page = PageRequest::new(Some(3), Some(10));
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn test_paginated_slicing() {
        let all: Vec<u32> = (1..=45).collect();
        let page = Paginated::from_vec(all, PageRequest::new(Some(3), Some(20)));
        assert_eq!(page.items, vec![41, 42, 43, 44, 45]);
        assert_eq!(page.total, 45);
        assert_eq!(page.last_page(), 3);

        let empty: Paginated<u32> = Paginated::from_vec(vec![], PageRequest::default());
        assert_eq!(empty.last_page(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("pool timed out".into()).is_transient());
        assert!(!StoreError::Constraint("visits_session_id_check".into()).is_transient());
        assert!(!StoreError::Decode("bad uuid".into()).is_transient());
    }
}
