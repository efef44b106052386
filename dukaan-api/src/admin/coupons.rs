use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;
use dukaan_order::{Coupon, CouponError, CouponInput};

use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/{id}", put(update_coupon).delete(delete_coupon))
}

async fn list_coupons(State(state): State<AppState>) -> Result<Json<DataResponse<Vec<Coupon>>>, AppError> {
    Ok(data(state.repos.coupons.list().await?))
}

async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CouponInput>,
) -> Result<(StatusCode, Json<DataResponse<Coupon>>), AppError> {
    payload.validate()?;
    let coupon = Coupon::from_input(payload);
    state.repos.coupons.create(&coupon).await?;
    info!("Coupon created: {}", coupon.code);
    Ok((StatusCode::CREATED, data(coupon)))
}

/// Usage count is left as is.
async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CouponInput>,
) -> Result<Json<DataResponse<Coupon>>, AppError> {
    let mut coupon = state
        .repos
        .coupons
        .get(id)
        .await?
        .ok_or_else(|| CouponError::NotFound(id.to_string()))?;
    payload.validate()?;
    coupon.apply_input(payload);
    state.repos.coupons.update(&coupon).await?;
    Ok(data(coupon))
}

async fn delete_coupon(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.repos.coupons.delete(id).await?;
    info!("Coupon deleted: {}", id);
    Ok(StatusCode::NO_CONTENT)
}
