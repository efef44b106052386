use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use dukaan_shared::ValidationErrors;

use crate::bundle::{Bundle, BundleResource};
use crate::product::{Product, ProductSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hero,
    FeaturedProducts,
    FeaturedBundles,
    Announcement,
    CategoryStrip,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::FeaturedProducts => "featured_products",
            SectionKind::FeaturedBundles => "featured_bundles",
            SectionKind::Announcement => "announcement",
            SectionKind::CategoryStrip => "category_strip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hero" => Some(SectionKind::Hero),
            "featured_products" => Some(SectionKind::FeaturedProducts),
            "featured_bundles" => Some(SectionKind::FeaturedBundles),
            "announcement" => Some(SectionKind::Announcement),
            "category_strip" => Some(SectionKind::CategoryStrip),
            _ => None,
        }
    }
}

/// A block of homepage content managed from the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HomepageSection {
    pub id: Uuid,
    pub kind: SectionKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub position: i32,
    pub payload: serde_json::Value,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HomepageSection {
    pub fn from_input(input: SectionInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: input.kind,
            title: input.title.trim().to_string(),
            subtitle: input.subtitle,
            position: input.position.unwrap_or(0),
            payload: input.payload,
            is_active: input.is_active.unwrap_or(true),
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_input(&mut self, input: SectionInput) {
        self.kind = input.kind;
        self.title = input.title.trim().to_string();
        self.subtitle = input.subtitle;
        if let Some(position) = input.position {
            self.position = position;
        }
        self.payload = input.payload;
        if let Some(active) = input.is_active {
            self.is_active = active;
        }
        self.starts_at = input.starts_at;
        self.ends_at = input.ends_at;
        self.updated_at = Utc::now();
    }

    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.map_or(true, |s| s <= now)
            && self.ends_at.map_or(true, |e| now < e)
    }

    fn ids(&self, key: &str) -> Vec<Uuid> {
        self.payload[key]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| Uuid::parse_str(s).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.ids("product_ids")
    }

    pub fn bundle_ids(&self) -> Vec<Uuid> {
        self.ids("bundle_ids")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInput {
    pub kind: SectionKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub position: Option<i32>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl SectionInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("title", &self.title, 255);

        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                errors.add("ends_at", "The ends at must be a date after starts at.");
            }
        }

        let is_id_list = |key: &str| {
            self.payload[key].as_array().map_or(false, |ids| {
                !ids.is_empty()
                    && ids
                        .iter()
                        .all(|v| v.as_str().map_or(false, |s| Uuid::parse_str(s).is_ok()))
            })
        };

        match self.kind {
            SectionKind::Hero => {
                if self.payload["image_url"].as_str().map_or(true, str::is_empty) {
                    errors.add("payload.image_url", "A hero section needs an image url.");
                }
            }
            SectionKind::FeaturedProducts => {
                if !is_id_list("product_ids") {
                    errors.add("payload.product_ids", "Provide at least one valid product id.");
                }
            }
            SectionKind::FeaturedBundles => {
                if !is_id_list("bundle_ids") {
                    errors.add("payload.bundle_ids", "Provide at least one valid bundle id.");
                }
            }
            SectionKind::Announcement => {
                if self.payload["text"].as_str().map_or(true, |t| t.trim().is_empty()) {
                    errors.add("payload.text", "An announcement needs text.");
                }
            }
            SectionKind::CategoryStrip => {
                let ok = self.payload["categories"]
                    .as_array()
                    .map_or(false, |c| !c.is_empty() && c.iter().all(|v| v.is_string()));
                if !ok {
                    errors.add("payload.categories", "Provide at least one category.");
                }
            }
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    Hero {
        image_url: Option<String>,
        link_url: Option<String>,
        cta_label: Option<String>,
    },
    Products {
        products: Vec<ProductSummary>,
    },
    Bundles {
        bundles: Vec<BundleResource>,
    },
    Announcement {
        text: String,
    },
    Categories {
        categories: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomepageBlock {
    pub id: Uuid,
    pub kind: SectionKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub position: i32,
    pub content: BlockContent,
}

/// The storefront landing page as served to the SPA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Homepage {
    pub sections: Vec<HomepageBlock>,
    pub generated_at: DateTime<Utc>,
}

impl Homepage {
    /// Resolve visible sections in display order.
    ///
    /// Products that cannot be bought and bundles that are unavailable are left
    /// out; a section left with nothing to show is dropped.
    pub fn assemble(
        sections: &[HomepageSection],
        products: &HashMap<Uuid, Product>,
        bundles: &HashMap<Uuid, Bundle>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut visible: Vec<&HomepageSection> = sections.iter().filter(|s| s.is_visible(now)).collect();
        visible.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.title.cmp(&b.title)));

        let blocks = visible
            .into_iter()
            .filter_map(|section| {
                let content = match section.kind {
                    SectionKind::Hero => BlockContent::Hero {
                        image_url: section.payload["image_url"].as_str().map(str::to_string),
                        link_url: section.payload["link_url"].as_str().map(str::to_string),
                        cta_label: section.payload["cta_label"].as_str().map(str::to_string),
                    },
                    SectionKind::FeaturedProducts => {
                        let items: Vec<ProductSummary> = section
                            .product_ids()
                            .iter()
                            .filter_map(|id| products.get(id))
                            .filter(|p| p.is_purchasable())
                            .map(Product::summary)
                            .collect();
                        if items.is_empty() {
                            return None;
                        }
                        BlockContent::Products { products: items }
                    }
                    SectionKind::FeaturedBundles => {
                        let items: Vec<BundleResource> = section
                            .bundle_ids()
                            .iter()
                            .filter_map(|id| bundles.get(id))
                            .filter(|b| b.is_available(now, products))
                            .map(|b| b.resource(now, products))
                            .collect();
                        if items.is_empty() {
                            return None;
                        }
                        BlockContent::Bundles { bundles: items }
                    }
                    SectionKind::Announcement => BlockContent::Announcement {
                        text: section.payload["text"].as_str().unwrap_or_default().to_string(),
                    },
                    SectionKind::CategoryStrip => BlockContent::Categories {
                        categories: section.payload["categories"]
                            .as_array()
                            .map(|c| c.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                            .unwrap_or_default(),
                    },
                };
                Some(HomepageBlock {
                    id: section.id,
                    kind: section.kind,
                    title: section.title.clone(),
                    subtitle: section.subtitle.clone(),
                    position: section.position,
                    content,
                })
            })
            .collect();

        Self {
            sections: blocks,
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductInput;
    use chrono::Duration;
    use serde_json::json;

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

    fn section(kind: SectionKind, title: &str, position: i32, payload: serde_json::Value) -> HomepageSection {
        HomepageSection::from_input(SectionInput {
            kind,
            title: title.to_string(),
            subtitle: None,
            position: Some(position),
            payload,
            is_active: None,
            starts_at: None,
            ends_at: None,
        })
    }

    #[test]
    fn test_assemble_orders_and_filters_sections() {
        let now = Utc::now();
        let in_stock = product("IN", 4);
        let sold_out = product("OUT", 0);
        let products: HashMap<Uuid, Product> =
            [(in_stock.id, in_stock.clone()), (sold_out.id, sold_out.clone())].into_iter().collect();

        let mut expired = section(SectionKind::Announcement, "Old sale", 0, json!({"text": "gone"}));
        expired.ends_at = Some(now - Duration::hours(1));

        let sections = vec![
            section(SectionKind::FeaturedProducts, "Best sellers", 2, json!({
                "product_ids": [in_stock.id.to_string(), sold_out.id.to_string()]
            })),
            section(SectionKind::Hero, "Eid Collection", 1, json!({"image_url": "/img/eid.jpg"})),
            section(SectionKind::FeaturedProducts, "Sold out", 3, json!({
                "product_ids": [sold_out.id.to_string()]
            })),
            expired,
        ];

        let page = Homepage::assemble(&sections, &products, &HashMap::new(), now);
        let titles: Vec<&str> = page.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Eid Collection", "Best sellers"]);

        match &page.sections[1].content {
            BlockContent::Products { products } => {
                assert_eq!(products.len(), 1);
                assert_eq!(products[0].id, in_stock.id);
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_section_input_validation() {
        let mut input = SectionInput {
            kind: SectionKind::FeaturedProducts,
            title: "Picks".to_string(),
            subtitle: None,
            position: None,
            payload: json!({"product_ids": ["not-a-uuid"]}),
            is_active: None,
            starts_at: None,
            ends_at: None,
        };
        assert!(input.validate().unwrap_err().has("payload.product_ids"));

        input.payload = json!({"product_ids": [Uuid::new_v4().to_string()]});
        assert!(input.validate().is_ok());

        input.kind = SectionKind::Hero;
        assert!(input.validate().unwrap_err().has("payload.image_url"));
    }
}
