use chrono::{Duration, Utc};
use serde_json::json;
use dukaan_catalog::bundle::{BundleInput, BundleSlotInput};
use dukaan_catalog::homepage::SectionInput;
use dukaan_catalog::{
    Bundle, BundleItem, BundleType, DiscountType, HomepageSection, Product, ProductInput, SectionKind,
};
use dukaan_order::{Coupon, CouponInput};

/// Starter content for the memory backend.
pub struct DemoCatalog {
    pub products: Vec<Product>,
    pub bundles: Vec<Bundle>,
    pub coupons: Vec<Coupon>,
    pub sections: Vec<HomepageSection>,
}

fn product(sku: &str, name: &str, category: &str, price: i64, sale_price: Option<i64>, stock: i32) -> Product {
    Product::from_input(ProductInput {
        sku: sku.to_string(),
        name: name.to_string(),
        slug: None,
        description: None,
        category: Some(category.to_string()),
        price,
        sale_price,
        stock,
        is_active: Some(true),
        image_url: None,
    })
}

pub fn demo_catalog() -> DemoCatalog {
    let now = Utc::now();

    let chai = product("CHAI-250", "Kashmiri Chai 250g", "tea", 85_000, None, 40);
    let green = product("GREEN-100", "Green Tea 100g", "tea", 60_000, Some(52_000), 25);
    let mug = product("MUG-CLAY", "Clay Mug", "kitchen", 45_000, None, 18);
    let honey = product("HONEY-500", "Sidr Honey 500g", "pantry", 240_000, None, 8);
    let dates = product("DATES-1KG", "Ajwa Dates 1kg", "pantry", 180_000, Some(160_000), 3);

    let breakfast = Bundle::from_input(BundleInput {
        name: "Breakfast Box".to_string(),
        slug: None,
        description: Some("Chai with a mug to drink it from.".to_string()),
        bundle_type: BundleType::Fixed,
        discount_type: DiscountType::Percentage,
        discount_value: 10.0,
        starts_at: None,
        ends_at: None,
        stock_limit: Some(20),
        is_active: Some(true),
        image_url: None,
        items: vec![
            BundleItem { product_id: chai.id, quantity: 1 },
            BundleItem { product_id: mug.id, quantity: 2 },
        ],
        slots: Vec::new(),
    });

    let pantry = Bundle::from_input(BundleInput {
        name: "Build Your Pantry".to_string(),
        slug: None,
        description: Some("Pick a tea and up to two sweet things.".to_string()),
        bundle_type: BundleType::Configurable,
        discount_type: DiscountType::Fixed,
        discount_value: 20_000.0,
        starts_at: Some(now - Duration::days(1)),
        ends_at: Some(now + Duration::days(30)),
        stock_limit: None,
        is_active: Some(true),
        image_url: None,
        items: Vec::new(),
        slots: vec![
            BundleSlotInput {
                id: None,
                name: "Tea".to_string(),
                position: Some(0),
                min_select: 1,
                max_select: 1,
                eligible_product_ids: vec![chai.id, green.id],
            },
            BundleSlotInput {
                id: None,
                name: "Sweet".to_string(),
                position: Some(1),
                min_select: 1,
                max_select: 2,
                eligible_product_ids: vec![honey.id, dates.id],
            },
        ],
    });

    let welcome = Coupon::from_input(CouponInput {
        code: "welcome10".to_string(),
        discount_type: DiscountType::Percentage,
        value: 10.0,
        min_order_amount: Some(100_000),
        max_discount: Some(50_000),
        usage_limit: Some(500),
        starts_at: None,
        expires_at: None,
        is_active: Some(true),
    });

    let sections = vec![
        HomepageSection::from_input(SectionInput {
            kind: SectionKind::Hero,
            title: "Fresh from the hills".to_string(),
            subtitle: Some("Tea, honey and dates delivered nationwide".to_string()),
            position: Some(0),
            payload: json!({ "image_url": "/images/hero.jpg", "link_url": "/products", "cta_label": "Shop now" }),
            is_active: Some(true),
            starts_at: None,
            ends_at: None,
        }),
        HomepageSection::from_input(SectionInput {
            kind: SectionKind::FeaturedBundles,
            title: "Bundles".to_string(),
            subtitle: None,
            position: Some(1),
            payload: json!({ "bundle_ids": [breakfast.id, pantry.id] }),
            is_active: Some(true),
            starts_at: None,
            ends_at: None,
        }),
        HomepageSection::from_input(SectionInput {
            kind: SectionKind::FeaturedProducts,
            title: "Best sellers".to_string(),
            subtitle: None,
            position: Some(2),
            payload: json!({ "product_ids": [chai.id, honey.id, green.id] }),
            is_active: Some(true),
            starts_at: None,
            ends_at: None,
        }),
    ];

    DemoCatalog {
        products: vec![chai, green, mug, honey, dates],
        bundles: vec![breakfast, pantry],
        coupons: vec![welcome],
        sections,
    }
}
