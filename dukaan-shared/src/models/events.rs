use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: i64,
    pub currency: String,
    pub payment_method: String,
    pub item_count: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub from: String,
    pub to: String,
    pub actor: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentReceivedEvent {
    pub order_id: Uuid,
    pub gateway: String,
    pub reference: Option<String>,
    pub amount: i64,
    pub timestamp: i64,
}

/// A storefront interaction captured by the tracking endpoint.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct VisitEvent {
    pub id: Uuid,
    pub session_id: String,
    pub event_type: String,
    pub path: String,
    pub referrer: Option<String>,
    pub product_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}
