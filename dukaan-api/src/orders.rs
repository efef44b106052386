use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use dukaan_core::events::order_placed;
use dukaan_core::identity::secure_eq;
use dukaan_core::payment::PaymentRedirect;
use dukaan_core::repository::{OrderFilter, PageRequest};
use dukaan_order::{CheckoutRequest, Invoice, Order, OrderError, PaymentMethod};

use crate::cart::cart_context;
use crate::catalog::snapshot_for;
use crate::error::AppError;
use crate::middleware::MaybeClaims;
use crate::response::{data, paginated, DataResponse, PageResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    /// Lets a guest open the order page and invoice later.
    pub access_token: String,
    /// Wallet payments: the form to post the customer to.
    pub payment: Option<PaymentRedirect>,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MyOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout).get(my_orders))
        .route("/{id}/view", get(view_order))
        .route("/{id}/invoice", get(order_invoice))
}

// ============================================================================
// Checkout
// ============================================================================

async fn checkout(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<DataResponse<CheckoutResponse>>), AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let cart = state
        .repos
        .carts
        .get(&ctx.key)
        .await?
        .ok_or(OrderError::EmptyCart)?;

    let snapshot = snapshot_for(&state, &cart).await?;
    let coupon = match &cart.coupon_code {
        Some(code) => state.repos.coupons.get_by_code(code).await?,
        None => None,
    };
    let user_id = claims.0.as_ref().and_then(|c| c.user_id());
    let now = Utc::now();

    let prepared = state
        .manager
        .checkout(&cart, &snapshot, coupon.as_ref(), &payload, user_id, now)?;
    state.repos.orders.create(&prepared).await?;

    let order = prepared.order;
    info!("Order placed: {} ({} {})", order.order_number, order.total, order.currency);
    state.metrics.orders_placed.inc();

    if let Err(e) = state.repos.carts.delete(&ctx.key).await {
        warn!("Failed to clear cart {} after order {}: {}", ctx.key, order.order_number, e);
    }

    let events = state.events.clone();
    let event = order_placed(&order);
    tokio::spawn(async move {
        if let Err(e) = events.publish_order_placed(&event).await {
            error!("Failed to publish order placed event: {}", e);
        }
    });

    let payment = match order.payment_method {
        PaymentMethod::CashOnDelivery => None,
        method => match state.gateways.get(method) {
            Some(gateway) => match gateway.initiate(&order, now).await {
                Ok(redirect) => Some(redirect),
                Err(e) => {
                    // the order stands; the customer can retry payment from the order page
                    error!("Payment initiation failed for {}: {}", order.order_number, e);
                    None
                }
            },
            None => None,
        },
    };

    let access_token = order.access_token.clone();
    Ok((
        StatusCode::CREATED,
        data(CheckoutResponse {
            order,
            access_token,
            payment,
        }),
    ))
}

// ============================================================================
// Order pages
// ============================================================================

async fn my_orders(
    State(state): State<AppState>,
    claims: MaybeClaims,
    Query(query): Query<MyOrdersQuery>,
) -> Result<Json<PageResponse<Order>>, AppError> {
    let user_id = claims
        .0
        .as_ref()
        .and_then(|c| c.user_id())
        .ok_or_else(|| AppError::AuthenticationError("Sign in to see your orders".to_string()))?;

    let filter = OrderFilter {
        status: None,
        user_id: Some(user_id),
    };
    let page = state
        .repos
        .orders
        .list(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(paginated(page))
}

/// `{id}` is either the order UUID or its order number.
pub(crate) async fn find_order(state: &AppState, id: &str) -> Result<Order, AppError> {
    let order = match Uuid::parse_str(id) {
        Ok(uuid) => state.repos.orders.get(uuid).await?,
        Err(_) => state.repos.orders.get_by_number(id).await?,
    };
    order.ok_or_else(|| OrderError::NotFound(id.to_string()).into())
}

/// The access token, the owning customer, or an admin. Anyone else gets a 404
/// so order numbers cannot be enumerated.
async fn accessible_order(
    state: &AppState,
    id: &str,
    claims: &MaybeClaims,
    token: Option<&str>,
) -> Result<Order, AppError> {
    let order = find_order(state, id).await?;

    let by_token = token.map_or(false, |t| secure_eq(&order.access_token, t));
    let by_identity = claims.0.as_ref().map_or(false, |c| {
        c.is_admin() || (order.user_id.is_some() && c.user_id() == order.user_id)
    });

    if by_token || by_identity {
        Ok(order)
    } else {
        Err(OrderError::NotFound(id.to_string()).into())
    }
}

async fn view_order(
    State(state): State<AppState>,
    claims: MaybeClaims,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<DataResponse<Order>>, AppError> {
    let order = accessible_order(&state, &id, &claims, query.token.as_deref()).await?;
    Ok(data(order))
}

async fn order_invoice(
    State(state): State<AppState>,
    claims: MaybeClaims,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<DataResponse<Invoice>>, AppError> {
    let order = accessible_order(&state, &id, &claims, query.token.as_deref()).await?;
    Ok(data(Invoice::from_order(&order, &state.shop.profile)))
}
