use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bundle::{Bundle, BundleSelection};
use crate::product::Product;

/// Net stock movement produced by a checkout or a cancellation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockAdjustments {
    /// Product id → change in stock (negative when sold).
    pub products: BTreeMap<Uuid, i32>,
    /// Bundle id → change in sold count (positive when sold).
    pub bundles: BTreeMap<Uuid, i32>,
}

impl StockAdjustments {
    pub fn is_empty(&self) -> bool {
        self.products.values().all(|d| *d == 0) && self.bundles.values().all(|d| *d == 0)
    }

    /// The movement that undoes this one.
    pub fn inverted(&self) -> Self {
        Self {
            products: self.products.iter().map(|(id, d)| (*id, -d)).collect(),
            bundles: self.bundles.iter().map(|(id, d)| (*id, -d)).collect(),
        }
    }
}

/// Working copy of stock levels used to check a whole cart before anything is written.
pub struct StockLedger {
    stock: HashMap<Uuid, i32>,
    bundle_remaining: HashMap<Uuid, Option<i32>>,
    adjustments: StockAdjustments,
}

impl StockLedger {
    pub fn new(products: &HashMap<Uuid, Product>) -> Self {
        Self {
            stock: products.iter().map(|(id, p)| (*id, p.stock)).collect(),
            bundle_remaining: HashMap::new(),
            adjustments: StockAdjustments::default(),
        }
    }

    pub fn available(&self, product_id: &Uuid) -> Option<i32> {
        self.stock.get(product_id).copied()
    }

    /// Take `quantity` units of a product.
    pub fn reserve_product(&mut self, product_id: &Uuid, quantity: i32) -> Result<(), InventoryError> {
        let available = self
            .stock
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))?;

        if *available < quantity {
            return Err(InventoryError::InsufficientStock {
                item: product_id.to_string(),
                requested: quantity,
                available: *available,
            });
        }

        *available -= quantity;
        *self.adjustments.products.entry(*product_id).or_default() -= quantity;
        Ok(())
    }

    /// Give back `quantity` units of a product.
    pub fn release_product(&mut self, product_id: &Uuid, quantity: i32) -> Result<(), InventoryError> {
        let available = self
            .stock
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))?;

        *available += quantity;
        *self.adjustments.products.entry(*product_id).or_default() += quantity;
        Ok(())
    }

    /// Take `quantity` bundles: checks the bundle limit, then every component.
    ///
    /// Either all components are reserved or none are.
    pub fn reserve_bundle(
        &mut self,
        bundle: &Bundle,
        selection: &BundleSelection,
        quantity: i32,
    ) -> Result<(), InventoryError> {
        let remaining = *self
            .bundle_remaining
            .entry(bundle.id)
            .or_insert_with(|| bundle.limit_remaining());

        if let Some(left) = remaining {
            if left < quantity {
                return Err(InventoryError::InsufficientStock {
                    item: bundle.name.clone(),
                    requested: quantity,
                    available: left,
                });
            }
        }

        let components = bundle.components(selection);
        for (product_id, per_unit) in &components {
            let needed = per_unit * quantity;
            let available = self
                .stock
                .get(product_id)
                .copied()
                .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))?;
            if available < needed {
                return Err(InventoryError::InsufficientStock {
                    item: product_id.to_string(),
                    requested: needed,
                    available,
                });
            }
        }

        for (product_id, per_unit) in &components {
            self.reserve_product(product_id, per_unit * quantity)?;
        }
        self.bundle_remaining
            .insert(bundle.id, remaining.map(|left| left - quantity));
        *self.adjustments.bundles.entry(bundle.id).or_default() += quantity;
        Ok(())
    }

    pub fn release_bundle(
        &mut self,
        bundle: &Bundle,
        selection: &BundleSelection,
        quantity: i32,
    ) -> Result<(), InventoryError> {
        for (product_id, per_unit) in bundle.components(selection) {
            self.release_product(&product_id, per_unit * quantity)?;
        }
        *self.adjustments.bundles.entry(bundle.id).or_default() -= quantity;
        Ok(())
    }

    pub fn adjustments(&self) -> &StockAdjustments {
        &self.adjustments
    }

    pub fn into_adjustments(self) -> StockAdjustments {
        self.adjustments
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: i32,
        available: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleInput, BundleItem, BundleType};
    use crate::pricing::DiscountType;
    use crate::product::ProductInput;

    fn product(sku: &str, stock: i32) -> Product {
        Product::from_input(ProductInput {
            sku: sku.to_string(),
            name: sku.to_string(),
            slug: None,
            description: None,
            category: None,
            price: 10_000,
            sale_price: None,
            stock,
            is_active: None,
            image_url: None,
        })
    }

    #[test]
    fn test_product_reserve_and_release() {
        let tea = product("TEA", 5);
        let products: HashMap<Uuid, Product> = [(tea.id, tea.clone())].into_iter().collect();
        let mut ledger = StockLedger::new(&products);

        ledger.reserve_product(&tea.id, 3).unwrap();
        assert_eq!(ledger.available(&tea.id), Some(2));

        let err = ledger.reserve_product(&tea.id, 3).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { requested: 3, available: 2, .. }));

        ledger.release_product(&tea.id, 1).unwrap();
        assert_eq!(ledger.available(&tea.id), Some(3));
        assert_eq!(ledger.adjustments().products[&tea.id], -2);
        assert!(ledger.reserve_product(&Uuid::new_v4(), 1).is_err());
    }

    #[test]
    fn test_bundle_reservation_is_all_or_nothing() {
        let tea = product("TEA", 10);
        let cup = product("CUP", 1);
        let products: HashMap<Uuid, Product> =
            [(tea.id, tea.clone()), (cup.id, cup.clone())].into_iter().collect();
        let mut bundle = Bundle::from_input(BundleInput {
            name: "Tea Set".to_string(),
            slug: None,
            description: None,
            bundle_type: BundleType::Fixed,
            discount_type: DiscountType::Percentage,
            discount_value: 10.0,
            starts_at: None,
            ends_at: None,
            stock_limit: Some(3),
            is_active: None,
            image_url: None,
            items: vec![
                BundleItem { product_id: tea.id, quantity: 2 },
                BundleItem { product_id: cup.id, quantity: 1 },
            ],
            slots: vec![],
        });
        bundle.sold_count = 1;

        let mut ledger = StockLedger::new(&products);
        let selection = BundleSelection::new();

        // cup stock allows only one
        assert!(ledger.reserve_bundle(&bundle, &selection, 2).is_err());
        assert_eq!(ledger.available(&tea.id), Some(10));

        ledger.reserve_bundle(&bundle, &selection, 1).unwrap();
        assert_eq!(ledger.available(&tea.id), Some(8));
        assert_eq!(ledger.available(&cup.id), Some(0));
        assert_eq!(ledger.adjustments().bundles[&bundle.id], 1);

        let adjustments = ledger.into_adjustments();
        let undo = adjustments.inverted();
        assert_eq!(undo.products[&tea.id], 2);
        assert_eq!(undo.bundles[&bundle.id], -1);
    }

    #[test]
    fn test_bundle_limit_enforced_across_lines() {
        let tea = product("TEA", 100);
        let products: HashMap<Uuid, Product> = [(tea.id, tea.clone())].into_iter().collect();
        let mut bundle = Bundle::from_input(BundleInput {
            name: "Tea Duo".to_string(),
            slug: None,
            description: None,
            bundle_type: BundleType::Fixed,
            discount_type: DiscountType::Fixed,
            discount_value: 500.0,
            starts_at: None,
            ends_at: None,
            stock_limit: Some(2),
            is_active: None,
            image_url: None,
            items: vec![BundleItem { product_id: tea.id, quantity: 2 }],
            slots: vec![],
        });
        bundle.sold_count = 0;

        let mut ledger = StockLedger::new(&products);
        let selection = BundleSelection::new();
        ledger.reserve_bundle(&bundle, &selection, 1).unwrap();
        ledger.reserve_bundle(&bundle, &selection, 1).unwrap();
        let err = ledger.reserve_bundle(&bundle, &selection, 1).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { available: 0, .. }));
    }
}
