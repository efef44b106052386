use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use dukaan_shared::ValidationErrors;

use crate::pricing::{apply_discount, DiscountType, Savings};
use crate::product::{slugify, Product, ProductSummary};

/// Customer picks per slot: slot id → chosen product ids.
pub type BundleSelection = BTreeMap<Uuid, Vec<Uuid>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BundleType {
    /// A set list of products sold together.
    Fixed,
    /// Fixed items plus slots the customer fills in.
    Configurable,
}

impl BundleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleType::Fixed => "fixed",
            BundleType::Configurable => "configurable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(BundleType::Fixed),
            "configurable" => Some(BundleType::Configurable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleSlot {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub min_select: u32,
    pub max_select: u32,
    pub eligible_product_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bundle {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub bundle_type: BundleType,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub stock_limit: Option<i32>,
    pub sold_count: i32,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub items: Vec<BundleItem>,
    pub slots: Vec<BundleSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundlePrice {
    pub original: i64,
    pub discounted: i64,
    pub savings: Savings,
}

impl BundlePrice {
    fn from_original(original: i64, discount_type: DiscountType, value: f64) -> Self {
        let discounted = apply_discount(original, discount_type, value);
        Self {
            original,
            discounted,
            savings: Savings::between(original, discounted),
        }
    }
}

impl Bundle {
    pub fn from_input(input: BundleInput) -> Self {
        let now = Utc::now();
        let mut bundle = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            slug: String::new(),
            description: None,
            bundle_type: input.bundle_type,
            discount_type: input.discount_type,
            discount_value: 0.0,
            starts_at: None,
            ends_at: None,
            stock_limit: None,
            sold_count: 0,
            is_active: true,
            image_url: None,
            items: Vec::new(),
            slots: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        bundle.apply_input(input);
        bundle
    }

    /// Overwrite editable fields. Slots keep their id when the input carries one.
    pub fn apply_input(&mut self, input: BundleInput) {
        self.slug = match &input.slug {
            Some(slug) if !slug.trim().is_empty() => slug.trim().to_string(),
            _ => slugify(&input.name),
        };
        self.name = input.name.trim().to_string();
        self.description = input.description;
        self.bundle_type = input.bundle_type;
        self.discount_type = input.discount_type;
        self.discount_value = input.discount_value;
        self.starts_at = input.starts_at;
        self.ends_at = input.ends_at;
        self.stock_limit = input.stock_limit;
        if let Some(active) = input.is_active {
            self.is_active = active;
        }
        self.image_url = input.image_url;
        self.items = input.items;
        self.slots = input
            .slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| BundleSlot {
                id: slot.id.unwrap_or_else(Uuid::new_v4),
                name: slot.name.trim().to_string(),
                position: slot.position.unwrap_or(idx as i32),
                min_select: slot.min_select,
                max_select: slot.max_select,
                eligible_product_ids: slot.eligible_product_ids,
            })
            .collect();
        self.slots.sort_by_key(|s| s.position);
        self.updated_at = Utc::now();
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.map_or(true, |start| start <= now)
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.map_or(false, |end| end <= now)
    }

    /// Seconds until the bundle stops selling; `None` for open-ended bundles.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.ends_at.map(|end| (end - now).num_seconds().max(0))
    }

    /// Units left under the bundle's own limit; `None` means unlimited.
    pub fn limit_remaining(&self) -> Option<i32> {
        self.stock_limit.map(|limit| (limit - self.sold_count).max(0))
    }

    /// Units that can still be sold, bounded by the limit and by fixed component stock.
    pub fn stock_remaining(&self, products: &HashMap<Uuid, Product>) -> Option<i32> {
        let mut remaining = self.limit_remaining();
        for item in &self.items {
            let capacity = match products.get(&item.product_id) {
                Some(product) if item.quantity > 0 => (product.stock.max(0)) / item.quantity,
                _ => 0,
            };
            remaining = Some(remaining.map_or(capacity, |r| r.min(capacity)));
        }
        remaining
    }

    /// Units of this bundle, built from `selection`, that the limit and the
    /// shelf can both cover.
    pub fn units_available(&self, selection: &BundleSelection, products: &HashMap<Uuid, Product>) -> i32 {
        let mut remaining = self.limit_remaining().unwrap_or(i32::MAX);
        for (product_id, per_bundle) in self.components(selection) {
            let capacity = match products.get(&product_id) {
                Some(product) if per_bundle > 0 => product.stock.max(0) / per_bundle,
                _ => 0,
            };
            remaining = remaining.min(capacity);
        }
        remaining
    }

    pub fn is_available(&self, now: DateTime<Utc>, products: &HashMap<Uuid, Product>) -> bool {
        if !self.is_active || !self.has_started(now) || self.has_ended(now) {
            return false;
        }
        if self.stock_remaining(products) == Some(0) {
            return false;
        }
        let components_ok = self.items.iter().all(|item| {
            products
                .get(&item.product_id)
                .map_or(false, |p| p.is_active && p.stock >= item.quantity)
        });
        if !components_ok {
            return false;
        }
        match self.bundle_type {
            BundleType::Fixed => true,
            BundleType::Configurable => self.slots.iter().all(|slot| {
                let purchasable = slot
                    .eligible_product_ids
                    .iter()
                    .filter(|id| products.get(*id).map_or(false, Product::is_purchasable))
                    .count();
                purchasable >= slot.min_select as usize
            }),
        }
    }

    fn fixed_items_total(&self, products: &HashMap<Uuid, Product>) -> Result<i64, BundleError> {
        self.items.iter().try_fold(0i64, |acc, item| {
            let product = products
                .get(&item.product_id)
                .ok_or(BundleError::ProductUnavailable(item.product_id))?;
            Ok(acc + product.effective_price() * item.quantity as i64)
        })
    }

    /// Price of a fixed bundle: sum of component prices, then the bundle discount.
    pub fn price_fixed(&self, products: &HashMap<Uuid, Product>) -> Result<BundlePrice, BundleError> {
        let original = self.fixed_items_total(products)?;
        Ok(BundlePrice::from_original(original, self.discount_type, self.discount_value))
    }

    pub fn validate_selection(&self, selection: &BundleSelection) -> Result<(), BundleError> {
        if self.bundle_type != BundleType::Configurable {
            if selection.values().any(|picks| !picks.is_empty()) {
                return Err(BundleError::NotConfigurable);
            }
            return Ok(());
        }

        for slot_id in selection.keys() {
            if !self.slots.iter().any(|s| s.id == *slot_id) {
                return Err(BundleError::UnknownSlot(*slot_id));
            }
        }

        for slot in &self.slots {
            let picks = selection.get(&slot.id).map(Vec::as_slice).unwrap_or(&[]);
            let mut seen = HashSet::new();
            for product_id in picks {
                if !slot.eligible_product_ids.contains(product_id) {
                    return Err(BundleError::IneligibleProduct {
                        slot: slot.name.clone(),
                        product_id: *product_id,
                    });
                }
                if !seen.insert(*product_id) {
                    return Err(BundleError::DuplicateSelection {
                        slot: slot.name.clone(),
                        product_id: *product_id,
                    });
                }
            }
            let count = picks.len() as u32;
            if count < slot.min_select || count > slot.max_select {
                return Err(BundleError::SelectionCount {
                    slot: slot.name.clone(),
                    min: slot.min_select,
                    max: slot.max_select,
                    selected: count,
                });
            }
        }
        Ok(())
    }

    /// Price a configurable bundle for a concrete selection.
    pub fn price_configurable(
        &self,
        selection: &BundleSelection,
        products: &HashMap<Uuid, Product>,
    ) -> Result<BundlePrice, BundleError> {
        if self.bundle_type != BundleType::Configurable {
            return Err(BundleError::NotConfigurable);
        }
        self.validate_selection(selection)?;

        let mut original = self.fixed_items_total(products)?;
        for product_id in selection.values().flatten() {
            let product = products
                .get(product_id)
                .filter(|p| p.is_purchasable())
                .ok_or(BundleError::ProductUnavailable(*product_id))?;
            original += product.effective_price();
        }
        Ok(BundlePrice::from_original(original, self.discount_type, self.discount_value))
    }

    /// Price for whatever type this bundle is; fixed bundles ignore the selection.
    pub fn price_for(
        &self,
        selection: &BundleSelection,
        products: &HashMap<Uuid, Product>,
    ) -> Result<BundlePrice, BundleError> {
        match self.bundle_type {
            BundleType::Fixed => self.price_fixed(products),
            BundleType::Configurable => self.price_configurable(selection, products),
        }
    }

    /// Lowest price a configurable bundle can be bought for ("from" price).
    pub fn starting_price(&self, products: &HashMap<Uuid, Product>) -> Result<BundlePrice, BundleError> {
        if self.bundle_type == BundleType::Fixed {
            return self.price_fixed(products);
        }
        let mut original = self.fixed_items_total(products)?;
        for slot in &self.slots {
            let mut prices: Vec<i64> = slot
                .eligible_product_ids
                .iter()
                .filter_map(|id| products.get(id))
                .filter(|p| p.is_purchasable())
                .map(Product::effective_price)
                .collect();
            prices.sort_unstable();
            if prices.len() < slot.min_select as usize {
                return Err(BundleError::NotAvailable(format!(
                    "slot '{}' does not have enough products in stock",
                    slot.name
                )));
            }
            original += prices.iter().take(slot.min_select as usize).sum::<i64>();
        }
        Ok(BundlePrice::from_original(original, self.discount_type, self.discount_value))
    }

    /// Product quantities consumed by one unit of this bundle with the given selection.
    pub fn components(&self, selection: &BundleSelection) -> Vec<(Uuid, i32)> {
        let mut totals: BTreeMap<Uuid, i32> = BTreeMap::new();
        for item in &self.items {
            *totals.entry(item.product_id).or_default() += item.quantity;
        }
        if self.bundle_type == BundleType::Configurable {
            for product_id in selection.values().flatten() {
                *totals.entry(*product_id).or_default() += 1;
            }
        }
        totals.into_iter().collect()
    }

    /// Serializer shape returned by the storefront and admin API.
    pub fn resource(&self, now: DateTime<Utc>, products: &HashMap<Uuid, Product>) -> BundleResource {
        let price = self.starting_price(products).ok();
        BundleResource {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            bundle_type: self.bundle_type,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            original_price: price.map(|p| p.original),
            price: price.map(|p| p.discounted),
            savings: price.map(|p| p.savings),
            is_available: self.is_available(now, products),
            stock_remaining: self.stock_remaining(products),
            time_remaining: self.time_remaining(now),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: self.is_active,
            sold_count: self.sold_count,
            image_url: self.image_url.clone(),
            items: self
                .items
                .iter()
                .filter_map(|item| {
                    products.get(&item.product_id).map(|p| BundleItemResource {
                        product: p.summary(),
                        quantity: item.quantity,
                    })
                })
                .collect(),
            slots: self
                .slots
                .iter()
                .map(|slot| BundleSlotResource {
                    id: slot.id,
                    name: slot.name.clone(),
                    position: slot.position,
                    min_select: slot.min_select,
                    max_select: slot.max_select,
                    products: slot
                        .eligible_product_ids
                        .iter()
                        .filter_map(|id| products.get(id))
                        .map(Product::summary)
                        .collect(),
                })
                .collect(),
        }
    }

    /// Every product id this bundle references.
    pub fn referenced_product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.iter().map(|i| i.product_id).collect();
        for slot in &self.slots {
            ids.extend(slot.eligible_product_ids.iter().copied());
        }
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Sort picks and drop empty slots so equal selections compare equal.
pub fn normalize_selection(selection: &BundleSelection) -> BundleSelection {
    selection
        .iter()
        .filter(|(_, picks)| !picks.is_empty())
        .map(|(slot, picks)| {
            let mut picks = picks.clone();
            picks.sort();
            (*slot, picks)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleItemResource {
    pub product: ProductSummary,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSlotResource {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub min_select: u32,
    pub max_select: u32,
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResource {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub bundle_type: BundleType,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub original_price: Option<i64>,
    pub price: Option<i64>,
    pub savings: Option<Savings>,
    pub is_available: bool,
    pub stock_remaining: Option<i32>,
    pub time_remaining: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub sold_count: i32,
    pub image_url: Option<String>,
    pub items: Vec<BundleItemResource>,
    pub slots: Vec<BundleSlotResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSlotInput {
    pub id: Option<Uuid>,
    pub name: String,
    pub position: Option<i32>,
    pub min_select: u32,
    pub max_select: u32,
    pub eligible_product_ids: Vec<Uuid>,
}

/// Admin create/update payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub bundle_type: BundleType,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub stock_limit: Option<i32>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub items: Vec<BundleItem>,
    #[serde(default)]
    pub slots: Vec<BundleSlotInput>,
}

impl BundleInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name, 255);

        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                errors.add("ends_at", "The ends at must be a date after starts at.");
            }
        }

        if !self.discount_value.is_finite() || self.discount_value < 0.0 {
            errors.add("discount_value", "The discount value must be at least 0.");
        } else if self.discount_type == DiscountType::Percentage && self.discount_value > 100.0 {
            errors.add("discount_value", "The discount value may not be greater than 100.");
        }

        if let Some(limit) = self.stock_limit {
            if limit < 0 {
                errors.add("stock_limit", "The stock limit must be at least 0.");
            }
        }

        if self.items.iter().any(|item| item.quantity < 1) {
            errors.add("items", "Each item quantity must be at least 1.");
        }

        match self.bundle_type {
            BundleType::Fixed => {
                if self.items.is_empty() {
                    errors.add("items", "A fixed bundle needs at least one item.");
                }
                if !self.slots.is_empty() {
                    errors.add("slots", "A fixed bundle cannot have selection slots.");
                }
            }
            BundleType::Configurable => {
                if self.slots.is_empty() {
                    errors.add("slots", "A configurable bundle needs at least one slot.");
                }
            }
        }

        for slot in &self.slots {
            if slot.name.trim().is_empty() {
                errors.add("slots", "Each slot needs a name.");
            }
            if slot.max_select < 1 {
                errors.add("slots", format!("Slot '{}' must allow at least one selection.", slot.name));
            }
            if slot.min_select > slot.max_select {
                errors.add("slots", format!("Slot '{}' has min select above max select.", slot.name));
            }
            let distinct: HashSet<&Uuid> = slot.eligible_product_ids.iter().collect();
            if (slot.max_select as usize) > distinct.len() {
                errors.add(
                    "slots",
                    format!("Slot '{}' allows more selections than it has eligible products.", slot.name),
                );
            }
        }

        errors.into_result()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Bundle not found: {0}")]
    NotFound(String),

    #[error("Bundle not available: {0}")]
    NotAvailable(String),

    #[error("Bundle does not accept a selection")]
    NotConfigurable,

    #[error("Unknown slot: {0}")]
    UnknownSlot(Uuid),

    #[error("Product {product_id} cannot be chosen for slot '{slot}'")]
    IneligibleProduct { slot: String, product_id: Uuid },

    #[error("Product {product_id} chosen twice for slot '{slot}'")]
    DuplicateSelection { slot: String, product_id: Uuid },

    #[error("Slot '{slot}' needs between {min} and {max} selections, got {selected}")]
    SelectionCount { slot: String, min: u32, max: u32, selected: u32 },

    #[error("Product unavailable: {0}")]
    ProductUnavailable(Uuid),

    #[error("Invalid bundle: {0}")]
    Invalid(ValidationErrors),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product(name: &str, price: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: slugify(name).to_uppercase(),
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            category: None,
            price,
            sale_price: None,
            stock,
            is_active: true,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn index(products: &[Product]) -> HashMap<Uuid, Product> {
        products.iter().map(|p| (p.id, p.clone())).collect()
    }

    fn fixed_bundle(items: Vec<BundleItem>, discount_type: DiscountType, value: f64) -> Bundle {
        Bundle::from_input(BundleInput {
            name: "Breakfast Box".to_string(),
            slug: None,
            description: None,
            bundle_type: BundleType::Fixed,
            discount_type,
            discount_value: value,
            starts_at: None,
            ends_at: None,
            stock_limit: None,
            is_active: None,
            image_url: None,
            items,
            slots: vec![],
        })
    }

    #[test]
    fn test_fixed_bundle_percentage_price() {
        let tea = product("Tea", 50_000, 10);
        let rusk = product("Rusk", 25_000, 10);
        let products = index(&[tea.clone(), rusk.clone()]);
        let bundle = fixed_bundle(
            vec![
                BundleItem { product_id: tea.id, quantity: 2 },
                BundleItem { product_id: rusk.id, quantity: 1 },
            ],
            DiscountType::Percentage,
            10.0,
        );

        let price = bundle.price_fixed(&products).unwrap();
        assert_eq!(price.original, 125_000);
        assert_eq!(price.discounted, 112_500);
        assert_eq!(price.savings.amount, 12_500);
        assert_eq!(price.savings.percentage, 10);
    }

    #[test]
    fn test_fixed_discount_never_negative() {
        let tea = product("Tea", 5_000, 10);
        let products = index(&[tea.clone()]);
        let bundle = fixed_bundle(
            vec![BundleItem { product_id: tea.id, quantity: 1 }],
            DiscountType::Fixed,
            9_000.0,
        );
        assert_eq!(bundle.price_fixed(&products).unwrap().discounted, 0);
    }

    #[test]
    fn test_stock_remaining_uses_limit_and_components() {
        let tea = product("Tea", 50_000, 7);
        let products = index(&[tea.clone()]);
        let mut bundle = fixed_bundle(
            vec![BundleItem { product_id: tea.id, quantity: 2 }],
            DiscountType::Fixed,
            0.0,
        );
        assert_eq!(bundle.stock_remaining(&products), Some(3));

        bundle.stock_limit = Some(5);
        bundle.sold_count = 4;
        assert_eq!(bundle.stock_remaining(&products), Some(1));

        bundle.sold_count = 9;
        assert_eq!(bundle.stock_remaining(&products), Some(0));
        assert!(!bundle.is_available(Utc::now(), &products));
    }

    #[test]
    fn test_units_available_counts_selected_picks() {
        let base = product("Gift Box", 10_000, 10);
        let a = product("Nimko", 30_000, 3);
        let b = product("Biscuits", 20_000, 8);
        let products = index(&[base.clone(), a.clone(), b.clone()]);
        let mut bundle = configurable(&[&a, &b], Some(&base));
        let slot_id = bundle.slots[0].id;
        bundle.slots[0].min_select = 1;

        let with_nimko: BundleSelection = [(slot_id, vec![a.id, b.id])].into_iter().collect();
        assert_eq!(bundle.units_available(&with_nimko, &products), 3);
        let biscuits_only: BundleSelection = [(slot_id, vec![b.id])].into_iter().collect();
        assert_eq!(bundle.units_available(&biscuits_only, &products), 8);

        bundle.sold_count = 45;
        assert_eq!(bundle.units_available(&biscuits_only, &products), 5);
    }

    #[test]
    fn test_availability_window() {
        let tea = product("Tea", 50_000, 7);
        let products = index(&[tea.clone()]);
        let now = Utc::now();
        let mut bundle = fixed_bundle(
            vec![BundleItem { product_id: tea.id, quantity: 1 }],
            DiscountType::Fixed,
            0.0,
        );
        assert!(bundle.is_available(now, &products));
        assert_eq!(bundle.time_remaining(now), None);

        bundle.starts_at = Some(now + Duration::hours(1));
        assert!(!bundle.is_available(now, &products));

        bundle.starts_at = Some(now - Duration::hours(1));
        bundle.ends_at = Some(now + Duration::seconds(90));
        assert!(bundle.is_available(now, &products));
        assert_eq!(bundle.time_remaining(now), Some(90));

        bundle.ends_at = Some(now - Duration::seconds(1));
        assert!(!bundle.is_available(now, &products));
        assert_eq!(bundle.time_remaining(now), Some(0));
    }

    fn configurable(slot_products: &[&Product], base: Option<&Product>) -> Bundle {
        Bundle::from_input(BundleInput {
            name: "Build Your Hamper".to_string(),
            slug: None,
            description: None,
            bundle_type: BundleType::Configurable,
            discount_type: DiscountType::Percentage,
            discount_value: 20.0,
            starts_at: None,
            ends_at: None,
            stock_limit: Some(50),
            is_active: None,
            image_url: None,
            items: base
                .map(|p| vec![BundleItem { product_id: p.id, quantity: 1 }])
                .unwrap_or_default(),
            slots: vec![BundleSlotInput {
                id: None,
                name: "Snacks".to_string(),
                position: None,
                min_select: 2,
                max_select: 3,
                eligible_product_ids: slot_products.iter().map(|p| p.id).collect(),
            }],
        })
    }

    #[test]
    fn test_configurable_selection_constraints() {
        let a = product("Nimko", 30_000, 5);
        let b = product("Biscuits", 20_000, 5);
        let c = product("Dates", 60_000, 5);
        let outsider = product("Soap", 10_000, 5);
        let bundle = configurable(&[&a, &b, &c], None);
        let slot_id = bundle.slots[0].id;

        let too_few: BundleSelection = [(slot_id, vec![a.id])].into_iter().collect();
        assert!(matches!(
            bundle.validate_selection(&too_few),
            Err(BundleError::SelectionCount { selected: 1, .. })
        ));

        let ineligible: BundleSelection = [(slot_id, vec![a.id, outsider.id])].into_iter().collect();
        assert!(matches!(
            bundle.validate_selection(&ineligible),
            Err(BundleError::IneligibleProduct { .. })
        ));

        let duplicate: BundleSelection = [(slot_id, vec![a.id, a.id])].into_iter().collect();
        assert!(matches!(
            bundle.validate_selection(&duplicate),
            Err(BundleError::DuplicateSelection { .. })
        ));

        let unknown: BundleSelection = [(Uuid::new_v4(), vec![a.id])].into_iter().collect();
        assert!(matches!(bundle.validate_selection(&unknown), Err(BundleError::UnknownSlot(_))));

        let empty = BundleSelection::new();
        assert!(bundle.validate_selection(&empty).is_err());

        let ok: BundleSelection = [(slot_id, vec![a.id, c.id])].into_iter().collect();
        assert!(bundle.validate_selection(&ok).is_ok());
    }

    #[test]
    fn test_configurable_pricing_and_starting_price() {
        let base = product("Gift Box", 10_000, 5);
        let a = product("Nimko", 30_000, 5);
        let b = product("Biscuits", 20_000, 5);
        let c = product("Dates", 60_000, 0);
        let products = index(&[base.clone(), a.clone(), b.clone(), c.clone()]);
        let bundle = configurable(&[&a, &b, &c], Some(&base));
        let slot_id = bundle.slots[0].id;

        let selection: BundleSelection = [(slot_id, vec![a.id, b.id])].into_iter().collect();
        let price = bundle.price_configurable(&selection, &products).unwrap();
        assert_eq!(price.original, 60_000);
        assert_eq!(price.discounted, 48_000);

        // out-of-stock pick is refused at pricing time
        let with_dates: BundleSelection = [(slot_id, vec![a.id, c.id])].into_iter().collect();
        assert!(matches!(
            bundle.price_configurable(&with_dates, &products),
            Err(BundleError::ProductUnavailable(id)) if id == c.id
        ));

        // two cheapest purchasable picks plus the base item
        let start = bundle.starting_price(&products).unwrap();
        assert_eq!(start.original, 60_000);
        assert!(bundle.is_available(Utc::now(), &products));
    }

    #[test]
    fn test_configurable_unavailable_when_slot_cannot_be_filled() {
        let a = product("Nimko", 30_000, 5);
        let b = product("Biscuits", 20_000, 0);
        let products = index(&[a.clone(), b.clone()]);
        let mut bundle = configurable(&[&a, &b], None);
        bundle.slots[0].max_select = 2;
        assert!(!bundle.is_available(Utc::now(), &products));
        assert!(bundle.starting_price(&products).is_err());
    }

    #[test]
    fn test_components_merge_items_and_picks() {
        let base = product("Gift Box", 10_000, 5);
        let a = product("Nimko", 30_000, 5);
        let b = product("Biscuits", 20_000, 5);
        let bundle = configurable(&[&a, &b, &base], Some(&base));
        let slot_id = bundle.slots[0].id;
        let selection: BundleSelection = [(slot_id, vec![a.id, base.id])].into_iter().collect();

        let components: HashMap<Uuid, i32> = bundle.components(&selection).into_iter().collect();
        assert_eq!(components[&base.id], 2);
        assert_eq!(components[&a.id], 1);
        assert!(!components.contains_key(&b.id));
    }

    #[test]
    fn test_input_validation() {
        let tea = product("Tea", 50_000, 7);
        let mut input = BundleInput {
            name: "Chai Set".to_string(),
            slug: None,
            description: None,
            bundle_type: BundleType::Fixed,
            discount_type: DiscountType::Percentage,
            discount_value: 120.0,
            starts_at: Some(Utc::now()),
            ends_at: Some(Utc::now() - Duration::days(1)),
            stock_limit: Some(-1),
            is_active: None,
            image_url: None,
            items: vec![],
            slots: vec![],
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.has("discount_value"));
        assert!(errors.has("ends_at"));
        assert!(errors.has("stock_limit"));
        assert!(errors.has("items"));

        input.discount_value = 10.0;
        input.ends_at = None;
        input.stock_limit = None;
        input.items = vec![BundleItem { product_id: tea.id, quantity: 1 }];
        assert!(input.validate().is_ok());

        input.bundle_type = BundleType::Configurable;
        input.slots = vec![BundleSlotInput {
            id: None,
            name: "Cups".to_string(),
            position: None,
            min_select: 2,
            max_select: 3,
            eligible_product_ids: vec![tea.id],
        }];
        assert!(input.validate().unwrap_err().has("slots"));
    }

    #[test]
    fn test_normalize_selection() {
        let slot = Uuid::new_v4();
        let empty_slot = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let left: BundleSelection = [(slot, vec![a, b]), (empty_slot, vec![])].into_iter().collect();
        let right: BundleSelection = [(slot, vec![b, a])].into_iter().collect();
        assert_eq!(normalize_selection(&left), normalize_selection(&right));
    }
}
