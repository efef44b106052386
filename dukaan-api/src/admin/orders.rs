use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};
use dukaan_core::events::{payment_received, status_changed};
use dukaan_core::repository::{OrderFilter, OrderRevision, PageRequest};
use dukaan_order::{Order, OrderStatus, PaymentStatus};

use crate::error::AppError;
use crate::middleware::Claims;
use crate::orders::find_order;
use crate::response::{data, paginated, DataResponse, PageResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
    pub reference: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(show_order))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/payment", patch(update_payment))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<AdminOrderQuery>,
) -> Result<Json<PageResponse<Order>>, AppError> {
    let filter = OrderFilter {
        status: query.status,
        user_id: None,
    };
    let page = state
        .repos
        .orders
        .list(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(paginated(page))
}

async fn show_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Order>>, AppError> {
    Ok(data(find_order(&state, &id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<DataResponse<Order>>, AppError> {
    let mut order = find_order(&state, &id).await?;
    let was_paid = order.is_paid();
    let expected = OrderRevision::of(&order);

    let change = state.manager.transition(&mut order, payload.status)?;
    state
        .repos
        .orders
        .update(&order, expected, change.restock.as_ref())
        .await?;
    info!(
        "Order {} moved {} -> {} by {}",
        order.order_number,
        change.from.as_str(),
        change.to.as_str(),
        claims.email
    );

    let events = state.events.clone();
    let moved = status_changed(&order, change.from, &claims.email);
    // delivering a COD order collects the payment
    let paid = (!was_paid && order.is_paid()).then(|| payment_received(&order));
    tokio::spawn(async move {
        if let Err(e) = events.publish_status_changed(&moved).await {
            error!("Failed to publish status event: {}", e);
        }
        if let Some(event) = paid {
            if let Err(e) = events.publish_payment_received(&event).await {
                error!("Failed to publish payment event: {}", e);
            }
        }
    });

    Ok(data(order))
}

async fn update_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<DataResponse<Order>>, AppError> {
    let mut order = find_order(&state, &id).await?;
    let was_paid = order.is_paid();
    let expected = OrderRevision::of(&order);

    state
        .manager
        .set_payment_status(&mut order, payload.payment_status, payload.reference)?;
    state.repos.orders.update(&order, expected, None).await?;
    info!(
        "Payment for {} set to {} by {}",
        order.order_number,
        order.payment_status.as_str(),
        claims.email
    );

    if !was_paid && order.is_paid() {
        let events = state.events.clone();
        let event = payment_received(&order);
        tokio::spawn(async move {
            if let Err(e) = events.publish_payment_received(&event).await {
                error!("Failed to publish payment event: {}", e);
            }
        });
    }

    Ok(data(order))
}
