use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use dukaan_catalog::{BundleError, BundleSelection, InventoryError, ProductError};
use dukaan_order::manager::generate_token;
use dukaan_order::{Cart, CouponError, LineKind, PricedCart};
use dukaan_shared::ValidationErrors;

use crate::catalog::{products_for_bundles, snapshot_for};
use crate::error::AppError;
use crate::middleware::MaybeClaims;
use crate::response::data;
use crate::state::AppState;

pub const CART_TOKEN_HEADER: &str = "x-cart-token";
const TOKEN_LEN: usize = 32;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    #[serde(default)]
    pub selection: BundleSelection,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: PricedCart,
    /// Guest carts only; send it back as `X-Cart-Token`.
    pub cart_token: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/{line_id}", patch(update_item).delete(remove_item))
        .route("/coupon", post(apply_coupon).delete(remove_coupon))
}

// ============================================================================
// Cart identity
// ============================================================================

/// Which cart a request addresses.
pub(crate) struct CartContext {
    pub key: String,
    pub token: Option<String>,
}

/// Tokens we issue are alphanumeric; anything else is ignored and replaced.
pub(crate) fn guest_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CART_TOKEN_HEADER)?.to_str().ok()?.trim();
    let valid = (16..=64).contains(&value.len()) && value.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| value.to_string())
}

fn guest_key(token: &str) -> String {
    format!("guest:{}", token)
}

pub(crate) fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

pub(crate) fn cart_context(claims: &MaybeClaims, headers: &HeaderMap) -> Result<CartContext, AppError> {
    if let Some(claims) = &claims.0 {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AppError::AuthenticationError("Invalid token subject".to_string()))?;
        return Ok(CartContext {
            key: user_key(user_id),
            token: None,
        });
    }
    let token = guest_token(headers).unwrap_or_else(|| generate_token(TOKEN_LEN));
    Ok(CartContext {
        key: guest_key(&token),
        token: Some(token),
    })
}

async fn load_cart(state: &AppState, key: &str) -> Result<Cart, AppError> {
    Ok(state.repos.carts.get(key).await?.unwrap_or_else(|| Cart::new(key)))
}

/// Price `cart` against the live catalog.
pub(crate) async fn price_cart(state: &AppState, cart: &Cart) -> Result<PricedCart, AppError> {
    let snapshot = snapshot_for(state, cart).await?;
    let coupon = match &cart.coupon_code {
        Some(code) => state.repos.coupons.get_by_code(code).await?,
        None => None,
    };
    Ok(state.manager.pricer().price(cart, &snapshot, coupon.as_ref(), Utc::now()))
}

async fn respond(state: &AppState, ctx: CartContext, cart: &Cart) -> Result<Response, AppError> {
    let priced = price_cart(state, cart).await?;
    let mut response = data(CartResponse {
        cart: priced,
        cart_token: ctx.token.clone(),
    })
    .into_response();

    if let Some(value) = ctx.token.and_then(|t| HeaderValue::from_str(&t).ok()) {
        response.headers_mut().insert(CART_TOKEN_HEADER, value);
    }
    Ok(response)
}

/// Fold the caller's guest cart into their account cart after sign-in.
/// Failures are logged; signing in never fails because of the cart.
pub(crate) async fn merge_guest_cart(state: &AppState, headers: &HeaderMap, user_id: Uuid) {
    let Some(token) = guest_token(headers) else {
        return;
    };
    if let Err(e) = try_merge(state, &guest_key(&token), &user_key(user_id)).await {
        warn!("Could not merge guest cart into {}: {:?}", user_id, e);
    }
}

async fn try_merge(state: &AppState, guest: &str, user: &str) -> Result<(), AppError> {
    let Some(guest_cart) = state.repos.carts.get(guest).await? else {
        return Ok(());
    };
    if !guest_cart.is_empty() {
        let mut cart = load_cart(state, user).await?;
        cart.merge(guest_cart);
        state.repos.carts.save(&cart).await?;
        info!("Merged guest cart into {}", user);
    }
    state.repos.carts.delete(guest).await?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn show_cart(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let cart = load_cart(&state, &ctx.key).await?;
    respond(&state, ctx, &cart).await
}

async fn add_item(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
    Json(payload): Json<AddItemRequest>,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let mut cart = load_cart(&state, &ctx.key).await?;

    match (payload.product_id, payload.bundle_id) {
        (Some(product_id), None) => {
            let product = state
                .repos
                .products
                .get(product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| ProductError::NotFound(product_id.to_string()))?;
            if !product.is_purchasable() {
                return Err(ProductError::NotAvailable(product.name).into());
            }

            let line_id = cart.add_product(product_id, payload.quantity)?;
            let in_cart = cart
                .lines
                .iter()
                .find(|l| l.id == line_id)
                .map_or(payload.quantity, |l| l.quantity);
            if in_cart > product.stock {
                return Err(InventoryError::InsufficientStock {
                    item: product.name,
                    requested: in_cart,
                    available: product.stock,
                }
                .into());
            }
        }
        (None, Some(bundle_id)) => {
            let bundle = state
                .repos
                .bundles
                .get(bundle_id)
                .await?
                .filter(|b| b.is_active)
                .ok_or_else(|| BundleError::NotFound(bundle_id.to_string()))?;
            let products = products_for_bundles(&state, std::slice::from_ref(&bundle)).await?;
            if !bundle.is_available(Utc::now(), &products) {
                return Err(BundleError::NotAvailable(bundle.name).into());
            }
            // pricing checks the selection and that every pick can be sold
            bundle.price_for(&payload.selection, &products)?;
            let line_id = cart.add_bundle(bundle_id, &payload.selection, payload.quantity)?;
            let in_cart = cart
                .lines
                .iter()
                .find(|l| l.id == line_id)
                .map_or(payload.quantity, |l| l.quantity);
            let available = bundle.units_available(&payload.selection, &products);
            if in_cart > available {
                return Err(InventoryError::InsufficientStock {
                    item: bundle.name,
                    requested: in_cart,
                    available,
                }
                .into());
            }
        }
        _ => {
            let mut errors = ValidationErrors::new();
            errors.add("product_id", "Exactly one of product_id or bundle_id is required.");
            return Err(errors.into());
        }
    }

    state.repos.carts.save(&cart).await?;
    respond(&state, ctx, &cart).await
}

async fn update_item(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let mut cart = load_cart(&state, &ctx.key).await?;
    cart.update_quantity(line_id, payload.quantity)?;

    if let Some(line) = cart.lines.iter().find(|l| l.id == line_id) {
        let shortage = match &line.kind {
            LineKind::Product { product_id } => state
                .repos
                .products
                .get(*product_id)
                .await?
                .filter(|p| line.quantity > p.stock)
                .map(|p| (p.name, p.stock)),
            LineKind::Bundle { bundle_id, selection } => match state.repos.bundles.get(*bundle_id).await? {
                Some(bundle) => {
                    let products = products_for_bundles(&state, std::slice::from_ref(&bundle)).await?;
                    let available = bundle.units_available(selection, &products);
                    (line.quantity > available).then(|| (bundle.name, available))
                }
                None => None,
            },
        };
        if let Some((item, available)) = shortage {
            return Err(InventoryError::InsufficientStock {
                item,
                requested: line.quantity,
                available,
            }
            .into());
        }
    }

    state.repos.carts.save(&cart).await?;
    respond(&state, ctx, &cart).await
}

async fn remove_item(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
    Path(line_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let mut cart = load_cart(&state, &ctx.key).await?;
    cart.remove(line_id)?;
    state.repos.carts.save(&cart).await?;
    respond(&state, ctx, &cart).await
}

async fn clear_cart(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    state.repos.carts.delete(&ctx.key).await?;
    let cart = Cart::new(ctx.key.clone());
    respond(&state, ctx, &cart).await
}

async fn apply_coupon(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let mut cart = load_cart(&state, &ctx.key).await?;

    let coupon = state
        .repos
        .coupons
        .get_by_code(&payload.code)
        .await?
        .ok_or_else(|| CouponError::NotFound(payload.code.trim().to_string()))?;

    cart.remove_coupon();
    let subtotal = price_cart(&state, &cart).await?.subtotal;
    coupon.validate_for(subtotal, Utc::now())?;

    cart.apply_coupon(&coupon.code);
    state.repos.carts.save(&cart).await?;
    respond(&state, ctx, &cart).await
}

async fn remove_coupon(
    State(state): State<AppState>,
    claims: MaybeClaims,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ctx = cart_context(&claims, &headers)?;
    let mut cart = load_cart(&state, &ctx.key).await?;
    cart.remove_coupon();
    state.repos.carts.save(&cart).await?;
    respond(&state, ctx, &cart).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_token_validation() {
        let mut headers = HeaderMap::new();
        assert_eq!(guest_token(&headers), None);

        headers.insert(CART_TOKEN_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(guest_token(&headers), None);

        headers.insert(CART_TOKEN_HEADER, HeaderValue::from_static("not a token but long enough"));
        assert_eq!(guest_token(&headers), None);

        headers.insert(CART_TOKEN_HEADER, HeaderValue::from_static("Ab3dEf6hIj9kLm2nOp5q"));
        assert_eq!(guest_token(&headers).as_deref(), Some("Ab3dEf6hIj9kLm2nOp5q"));
    }

    #[test]
    fn test_guest_context_issues_token() {
        let ctx = cart_context(&MaybeClaims(None), &HeaderMap::new()).unwrap();
        let token = ctx.token.expect("token issued");
        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(ctx.key, format!("guest:{}", token));
    }
}
