use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use dukaan_catalog::bundle::BundleResource;
use dukaan_catalog::{BundleError, BundlePrice, BundleSelection, Bundle};

use crate::catalog::products_for_bundles;
use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    #[serde(default)]
    pub selection: BundleSelection,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub bundle_id: uuid::Uuid,
    #[serde(flatten)]
    pub price: BundlePrice,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bundles))
        .route("/{slug}", get(show_bundle))
        .route("/{slug}/price", post(price_bundle))
}

async fn find_active(state: &AppState, slug: &str) -> Result<Bundle, AppError> {
    let bundle = state
        .repos
        .bundles
        .get_by_slug(slug)
        .await?
        .filter(|b| b.is_active)
        .ok_or_else(|| BundleError::NotFound(slug.to_string()))?;
    Ok(bundle)
}

/// Bundles a customer can buy right now.
async fn list_bundles(State(state): State<AppState>) -> Result<Json<DataResponse<Vec<BundleResource>>>, AppError> {
    let bundles = state.repos.bundles.list(false).await?;
    let products = products_for_bundles(&state, &bundles).await?;
    let now = Utc::now();

    let resources = bundles
        .iter()
        .filter(|b| b.is_available(now, &products))
        .map(|b| b.resource(now, &products))
        .collect();
    Ok(data(resources))
}

/// Shown while active even if sold out or not yet started, so the page can say so.
async fn show_bundle(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<DataResponse<BundleResource>>, AppError> {
    let bundle = find_active(&state, &slug).await?;
    let products = products_for_bundles(&state, std::slice::from_ref(&bundle)).await?;
    Ok(data(bundle.resource(Utc::now(), &products)))
}

async fn price_bundle(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<PriceRequest>,
) -> Result<Json<DataResponse<PriceResponse>>, AppError> {
    let bundle = find_active(&state, &slug).await?;
    let products = products_for_bundles(&state, std::slice::from_ref(&bundle)).await?;
    if !bundle.is_available(Utc::now(), &products) {
        return Err(BundleError::NotAvailable(bundle.name).into());
    }

    let price = bundle.price_for(&payload.selection, &products)?;
    Ok(data(PriceResponse {
        bundle_id: bundle.id,
        price,
    }))
}
