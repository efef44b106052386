use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use dukaan_shared::ValidationErrors;
use crate::pricing::percent_of;

/// A sellable catalog entry. Prices are minor units (paisa).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub stock: i32,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_input(input: ProductInput) -> Self {
        let now = Utc::now();
        let slug = input.resolved_slug();
        Self {
            id: Uuid::new_v4(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            slug,
            description: input.description,
            category: input.category,
            price: input.price,
            sale_price: input.sale_price,
            stock: input.stock,
            is_active: input.is_active.unwrap_or(true),
            image_url: input.image_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite editable fields, keeping identity and creation time.
    pub fn apply_input(&mut self, input: ProductInput) {
        self.slug = input.resolved_slug();
        self.sku = input.sku.trim().to_string();
        self.name = input.name.trim().to_string();
        self.description = input.description;
        self.category = input.category;
        self.price = input.price;
        self.sale_price = input.sale_price;
        self.stock = input.stock;
        if let Some(active) = input.is_active {
            self.is_active = active;
        }
        self.image_url = input.image_url;
        self.updated_at = Utc::now();
    }

    /// The price a customer pays right now.
    pub fn effective_price(&self) -> i64 {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    pub fn is_on_sale(&self) -> bool {
        self.effective_price() < self.price
    }

    pub fn discount_percentage(&self) -> u32 {
        if !self.is_on_sale() {
            return 0;
        }
        percent_of(self.price - self.effective_price(), self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.in_stock()
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            sku: self.sku.clone(),
            name: self.name.clone(),
            slug: self.slug.clone(),
            category: self.category.clone(),
            price: self.price,
            effective_price: self.effective_price(),
            on_sale: self.is_on_sale(),
            discount_percentage: self.discount_percentage(),
            in_stock: self.in_stock(),
            stock: self.stock,
            image_url: self.image_url.clone(),
        }
    }
}

/// Storefront-facing projection of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSummary {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub category: Option<String>,
    pub price: i64,
    pub effective_price: i64,
    pub on_sale: bool,
    pub discount_percentage: u32,
    pub in_stock: bool,
    pub stock: i32,
    pub image_url: Option<String>,
}

/// Admin create/update payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub stock: i32,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.require("name", &self.name, 255);
        errors.require("sku", &self.sku, 64);
        if !self.sku.trim().is_empty()
            && !self.sku.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            errors.add("sku", "The sku may only contain letters, numbers, dashes and underscores.");
        }

        if self.price < 0 {
            errors.add("price", "The price must be at least 0.");
        }
        if let Some(sale) = self.sale_price {
            if sale < 0 {
                errors.add("sale_price", "The sale price must be at least 0.");
            } else if sale >= self.price {
                errors.add("sale_price", "The sale price must be less than price.");
            }
        }
        if self.stock < 0 {
            errors.add("stock", "The stock must be at least 0.");
        }
        if let Some(slug) = &self.slug {
            if !slug.is_empty() && slugify(slug) != *slug {
                errors.add("slug", "The slug may only contain lower-case letters, numbers and dashes.");
            }
        }

        errors.into_result()
    }

    pub fn resolved_slug(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slug.trim().to_string(),
            _ => slugify(&self.name),
        }
    }
}

/// Lower-case, with every run of non-alphanumerics collapsed into a single `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Product not available: {0}")]
    NotAvailable(String),

    #[error("Invalid product: {0}")]
    Invalid(ValidationErrors),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            sku: "TEA-500".to_string(),
            name: "Kashmiri Chai 500g".to_string(),
            slug: None,
            description: None,
            category: Some("tea".to_string()),
            price: 120_000,
            sale_price: Some(99_900),
            stock: 12,
            is_active: None,
            image_url: None,
        }
    }

    #[test]
    fn test_effective_price_prefers_lower_sale_price() {
        let mut product = Product::from_input(input());
        assert_eq!(product.effective_price(), 99_900);
        assert!(product.is_on_sale());
        assert_eq!(product.discount_percentage(), 17);

        product.sale_price = Some(150_000);
        assert_eq!(product.effective_price(), 120_000);
        assert!(!product.is_on_sale());
        assert_eq!(product.discount_percentage(), 0);
    }

    #[test]
    fn test_purchasable_requires_active_and_stock() {
        let mut product = Product::from_input(input());
        assert!(product.is_purchasable());
        product.stock = 0;
        assert!(!product.is_purchasable());
        product.stock = 3;
        product.is_active = false;
        assert!(!product.is_purchasable());
    }

    #[test]
    fn test_validation_rules() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.name = String::new();
        bad.sku = "TEA 500".to_string();
        bad.price = 1_000;
        bad.sale_price = Some(1_000);
        bad.stock = -1;
        let errors = bad.validate().unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("sku"));
        assert!(errors.has("sale_price"));
        assert!(errors.has("stock"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Kashmiri Chai 500g"), "kashmiri-chai-500g");
        assert_eq!(slugify("  Eid -- Gift   Box! "), "eid-gift-box");
        assert_eq!(Product::from_input(input()).slug, "kashmiri-chai-500g");
    }
}
