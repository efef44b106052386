use async_trait::async_trait;
use chrono::Utc;
use dukaan_order::{Order, OrderStatus};
use dukaan_shared::models::events::{OrderPlacedEvent, OrderStatusChangedEvent, PaymentReceivedEvent};

use crate::CoreError;

pub const TOPIC_ORDER_PLACED: &str = "orders.placed";
pub const TOPIC_ORDER_STATUS_CHANGED: &str = "orders.status_changed";
pub const TOPIC_PAYMENT_RECEIVED: &str = "payments.received";

/// Outbound domain events. Callers treat publishing as fire-and-forget.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_order_placed(&self, event: &OrderPlacedEvent) -> Result<(), CoreError>;

    async fn publish_status_changed(&self, event: &OrderStatusChangedEvent) -> Result<(), CoreError>;

    async fn publish_payment_received(&self, event: &PaymentReceivedEvent) -> Result<(), CoreError>;
}

pub fn order_placed(order: &Order) -> OrderPlacedEvent {
    OrderPlacedEvent {
        order_id: order.id,
        order_number: order.order_number.clone(),
        total: order.total,
        currency: order.currency.clone(),
        payment_method: order.payment_method.as_str().to_string(),
        item_count: order.item_count(),
        timestamp: Utc::now().timestamp(),
    }
}

pub fn status_changed(order: &Order, from: OrderStatus, actor: &str) -> OrderStatusChangedEvent {
    OrderStatusChangedEvent {
        order_id: order.id,
        from: from.as_str().to_string(),
        to: order.status.as_str().to_string(),
        actor: actor.to_string(),
        timestamp: Utc::now().timestamp(),
    }
}

pub fn payment_received(order: &Order) -> PaymentReceivedEvent {
    PaymentReceivedEvent {
        order_id: order.id,
        gateway: order.payment_method.as_str().to_string(),
        reference: order.payment_reference.clone(),
        amount: order.total,
        timestamp: Utc::now().timestamp(),
    }
}
