use axum::{
    extract::{Path, Query, State},
    routing::post,
    Form, Json, Router,
};
use serde::Serialize;
use tracing::{error, info, warn};
use dukaan_core::events::{payment_received, status_changed};
use dukaan_core::payment::{GatewayFields, PaymentError};
use dukaan_core::repository::OrderRevision;
use dukaan_order::{OrderError, OrderStatus, PaymentMethod, PaymentStatus};

use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub message: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/{gateway}/callback", post(callback_form).get(callback_query))
}

async fn callback_form(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Form(fields): Form<GatewayFields>,
) -> Result<Json<DataResponse<CallbackResponse>>, AppError> {
    handle_callback(&state, &gateway, fields).await.map(data)
}

/// Some wallets redirect the customer back with the result in the query string.
async fn callback_query(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Query(fields): Query<GatewayFields>,
) -> Result<Json<DataResponse<CallbackResponse>>, AppError> {
    handle_callback(&state, &gateway, fields).await.map(data)
}

async fn handle_callback(
    state: &AppState,
    gateway: &str,
    fields: GatewayFields,
) -> Result<CallbackResponse, AppError> {
    let method = PaymentMethod::parse(gateway)
        .filter(|m| *m != PaymentMethod::CashOnDelivery)
        .ok_or_else(|| PaymentError::UnknownGateway(gateway.to_string()))?;
    let gateway = state
        .gateways
        .get(method)
        .ok_or_else(|| PaymentError::NotConfigured(method.as_str().to_string()))?;

    let outcome = gateway.verify_callback(&fields).await.map_err(|e| {
        warn!("Rejected {} callback: {}", method.as_str(), e);
        e
    })?;

    let mut order = state
        .repos
        .orders
        .get_by_number(&outcome.order_number)
        .await?
        .ok_or_else(|| OrderError::NotFound(outcome.order_number.clone()))?;

    if order.payment_method != method {
        return Err(AppError::BadRequest(format!(
            "Order {} was not placed with {}",
            order.order_number,
            method.as_str()
        )));
    }
    if let Some(amount) = outcome.amount {
        let expected = gateway.expected_amount(&order);
        if amount != expected {
            warn!(
                "Amount mismatch on {}: gateway {} vs expected {}",
                order.order_number, amount, expected
            );
            return Err(AppError::BadRequest("Payment amount does not match the order".to_string()));
        }
    }

    let previous_status = order.status;
    let revision = OrderRevision::of(&order);
    let changed = state
        .manager
        .record_payment(&mut order, outcome.succeeded, outcome.reference.clone())?;

    if changed {
        state.repos.orders.update(&order, revision, None).await?;
        info!(
            "Payment {} for {} via {}",
            order.payment_status.as_str(),
            order.order_number,
            method.as_str()
        );

        let events = state.events.clone();
        let paid = order.is_paid().then(|| payment_received(&order));
        let moved = (order.status != previous_status)
            .then(|| status_changed(&order, previous_status, &format!("gateway:{}", method.as_str())));
        tokio::spawn(async move {
            if let Some(event) = paid {
                if let Err(e) = events.publish_payment_received(&event).await {
                    error!("Failed to publish payment event: {}", e);
                }
            }
            if let Some(event) = moved {
                if let Err(e) = events.publish_status_changed(&event).await {
                    error!("Failed to publish status event: {}", e);
                }
            }
        });
    }

    Ok(CallbackResponse {
        order_number: order.order_number,
        status: order.status,
        payment_status: order.payment_status,
        message: outcome.message,
    })
}
