use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use dukaan_shared::models::events::VisitEvent;
use dukaan_shared::ValidationErrors;

pub const TOP_LIMIT: usize = 10;
pub const MAX_PATH_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    ProductView,
    BundleView,
    AddToCart,
    Checkout,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageView => "page_view",
            EventKind::ProductView => "product_view",
            EventKind::BundleView => "bundle_view",
            EventKind::AddToCart => "add_to_cart",
            EventKind::Checkout => "checkout",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "page_view" => Some(EventKind::PageView),
            "product_view" => Some(EventKind::ProductView),
            "bundle_view" => Some(EventKind::BundleView),
            "add_to_cart" => Some(EventKind::AddToCart),
            "checkout" => Some(EventKind::Checkout),
            _ => None,
        }
    }
}

/// Tracking beacon posted by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEvent {
    pub event_type: EventKind,
    pub path: String,
    pub referrer: Option<String>,
    pub session_id: String,
    pub product_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
}

impl TrackEvent {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.path.starts_with('/') {
            errors.add("path", "The path must start with /.");
        } else if self.path.len() > MAX_PATH_LEN {
            errors.add("path", format!("The path may not be greater than {} characters.", MAX_PATH_LEN));
        }
        let session_len = self.session_id.chars().count();
        if !(8..=128).contains(&session_len) {
            errors.add("session_id", "The session id must be between 8 and 128 characters.");
        }
        if let Some(referrer) = &self.referrer {
            if referrer.len() > MAX_PATH_LEN {
                errors.add("referrer", format!("The referrer may not be greater than {} characters.", MAX_PATH_LEN));
            }
        }
        if self.event_type == EventKind::ProductView && self.product_id.is_none() {
            errors.add("product_id", "The product id is required for product views.");
        }
        if self.event_type == EventKind::BundleView && self.bundle_id.is_none() {
            errors.add("bundle_id", "The bundle id is required for bundle views.");
        }
        errors.into_result()
    }

    pub fn into_visit(self, ip_hash: Option<String>, user_agent: Option<String>, now: DateTime<Utc>) -> VisitEvent {
        VisitEvent {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            event_type: self.event_type.as_str().to_string(),
            path: self.path,
            referrer: self.referrer.filter(|r| !r.is_empty()),
            product_id: self.product_id,
            bundle_id: self.bundle_id,
            ip_hash,
            user_agent: user_agent.map(|ua| ua.chars().take(512).collect()),
            occurred_at: now,
        }
    }
}

/// One-way, salted fingerprint of a client address. The address itself is never stored.
pub fn anonymize_ip(ip: &str, salt: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(b"|")
        .chain_update(ip.trim().as_bytes())
        .finalize();
    hex::encode(digest)[..16].to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub events: u64,
    pub page_views: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathCount {
    pub path: String,
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductCount {
    pub product_id: Uuid,
    pub views: u64,
}

/// Aggregate traffic report for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_events: u64,
    pub page_views: u64,
    pub unique_sessions: u64,
    pub add_to_cart_sessions: u64,
    pub checkout_sessions: u64,
    /// Share of sessions that added something to the cart, 0.0–1.0.
    pub add_to_cart_rate: f64,
    pub daily: Vec<DailyCount>,
    pub top_paths: Vec<PathCount>,
    pub top_products: Vec<ProductCount>,
}

impl VisitSummary {
    /// Summarize visits between `from` and `to` inclusive (UTC days).
    ///
    /// Every day in the range gets a row, zero-filled when nothing happened.
    /// Ties in the top lists are broken by path / id so the output is stable.
    pub fn build(visits: &[VisitEvent], from: NaiveDate, to: NaiveDate) -> Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };

        let mut days: BTreeMap<NaiveDate, (u64, u64, HashSet<&str>)> = BTreeMap::new();
        let mut day = from;
        while day <= to {
            days.insert(day, (0, 0, HashSet::new()));
            day += Duration::days(1);
        }

        let mut sessions = HashSet::new();
        let mut cart_sessions = HashSet::new();
        let mut checkout_sessions = HashSet::new();
        let mut paths: HashMap<&str, u64> = HashMap::new();
        let mut products: HashMap<Uuid, u64> = HashMap::new();
        let mut total_events = 0;
        let mut page_views = 0;

        for visit in visits {
            let date = visit.occurred_at.date_naive();
            let Some(bucket) = days.get_mut(&date) else {
                continue;
            };
            total_events += 1;
            bucket.0 += 1;
            bucket.2.insert(visit.session_id.as_str());
            sessions.insert(visit.session_id.as_str());

            match EventKind::parse(&visit.event_type) {
                Some(EventKind::PageView) => {
                    page_views += 1;
                    bucket.1 += 1;
                    *paths.entry(visit.path.as_str()).or_default() += 1;
                }
                Some(EventKind::ProductView) => {
                    if let Some(id) = visit.product_id {
                        *products.entry(id).or_default() += 1;
                    }
                }
                Some(EventKind::AddToCart) => {
                    cart_sessions.insert(visit.session_id.as_str());
                }
                Some(EventKind::Checkout) => {
                    checkout_sessions.insert(visit.session_id.as_str());
                }
                Some(EventKind::BundleView) | None => {}
            }
        }

        let mut top_paths: Vec<PathCount> = paths
            .into_iter()
            .map(|(path, views)| PathCount { path: path.to_string(), views })
            .collect();
        top_paths.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.path.cmp(&b.path)));
        top_paths.truncate(TOP_LIMIT);

        let mut top_products: Vec<ProductCount> = products
            .into_iter()
            .map(|(product_id, views)| ProductCount { product_id, views })
            .collect();
        top_products.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.product_id.cmp(&b.product_id)));
        top_products.truncate(TOP_LIMIT);

        let unique_sessions = sessions.len() as u64;
        let add_to_cart_sessions = cart_sessions.len() as u64;
        let add_to_cart_rate = if unique_sessions == 0 {
            0.0
        } else {
            (add_to_cart_sessions as f64 / unique_sessions as f64 * 10_000.0).round() / 10_000.0
        };

        Self {
            from,
            to,
            total_events,
            page_views,
            unique_sessions,
            add_to_cart_sessions,
            checkout_sessions: checkout_sessions.len() as u64,
            add_to_cart_rate,
            daily: days
                .into_iter()
                .map(|(date, (events, page_views, sessions))| DailyCount {
                    date,
                    events,
                    page_views,
                    sessions: sessions.len() as u64,
                })
                .collect(),
            top_paths,
            top_products,
        }
    }
}
