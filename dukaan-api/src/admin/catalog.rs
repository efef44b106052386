use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use dukaan_catalog::bundle::{BundleInput, BundleResource};
use dukaan_catalog::{Bundle, BundleError, Product, ProductError, ProductInput};
use dukaan_core::repository::{PageRequest, ProductFilter};
use dukaan_shared::ValidationErrors;

use crate::catalog::{product_map, products_for_bundles};
use crate::error::AppError;
use crate::response::{data, paginated, DataResponse, PageResponse};
use crate::state::AppState;

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AdminProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub on_sale: Option<bool>,
    /// Only products at or below the shop's low-stock threshold.
    #[serde(default)]
    pub low_stock: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub stock: i32,
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/{id}", get(show_product).put(update_product).delete(delete_product))
        .route("/{id}/stock", patch(set_stock))
}

async fn find_product(state: &AppState, id: Uuid) -> Result<Product, AppError> {
    let product = state
        .repos
        .products
        .get(id)
        .await?
        .ok_or_else(|| ProductError::NotFound(id.to_string()))?;
    Ok(product)
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<PageResponse<Product>>, AppError> {
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        search: query.search.filter(|s| !s.trim().is_empty()),
        on_sale: query.on_sale,
        include_inactive: true,
        max_stock: query.low_stock.then_some(state.shop.low_stock_threshold),
    };
    let page = state
        .repos
        .products
        .list(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(paginated(page))
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductInput>,
) -> Result<(StatusCode, Json<DataResponse<Product>>), AppError> {
    payload.validate()?;
    let product = Product::from_input(payload);
    state.repos.products.create(&product).await?;
    info!("Product created: {} ({})", product.sku, product.id);
    Ok((StatusCode::CREATED, data(product)))
}

async fn show_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<Product>>, AppError> {
    Ok(data(find_product(&state, id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductInput>,
) -> Result<Json<DataResponse<Product>>, AppError> {
    let mut product = find_product(&state, id).await?;
    payload.validate()?;
    product.apply_input(payload);
    state.repos.products.update(&product).await?;
    Ok(data(product))
}

async fn delete_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    let product = find_product(&state, id).await?;

    let bundles = state.repos.bundles.list(true).await?;
    if let Some(bundle) = bundles.iter().find(|b| b.referenced_product_ids().contains(&id)) {
        return Err(AppError::ConflictError(format!(
            "{} is part of bundle '{}'",
            product.name, bundle.name
        )));
    }

    state.repos.products.delete(id).await?;
    info!("Product deleted: {}", product.sku);
    Ok(StatusCode::NO_CONTENT)
}

/// Absolute stock level, as counted on the shelf.
async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StockRequest>,
) -> Result<Json<DataResponse<Product>>, AppError> {
    if payload.stock < 0 {
        let mut errors = ValidationErrors::new();
        errors.add("stock", "The stock must be at least 0.");
        return Err(errors.into());
    }
    let product = state.repos.products.set_stock(id, payload.stock).await?;
    info!("Stock for {} set to {}", product.sku, product.stock);
    Ok(data(product))
}

// ============================================================================
// Bundles
// ============================================================================

pub fn bundle_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bundles).post(create_bundle))
        .route("/{id}", get(show_bundle).put(update_bundle).delete(delete_bundle))
}

async fn find_bundle(state: &AppState, id: Uuid) -> Result<Bundle, AppError> {
    let bundle = state
        .repos
        .bundles
        .get(id)
        .await?
        .ok_or_else(|| BundleError::NotFound(id.to_string()))?;
    Ok(bundle)
}

/// Every product a bundle points at must exist.
async fn check_references(state: &AppState, bundle: &Bundle) -> Result<(), AppError> {
    let ids = bundle.referenced_product_ids();
    let found = product_map(state, ids.clone()).await?;
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.contains_key(id))
        .map(Uuid::to_string)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    let mut errors = ValidationErrors::new();
    errors.add("items", format!("Unknown products: {}", missing.join(", ")));
    Err(errors.into())
}

async fn resource(state: &AppState, bundle: &Bundle) -> Result<BundleResource, AppError> {
    let products = products_for_bundles(state, std::slice::from_ref(bundle)).await?;
    Ok(bundle.resource(Utc::now(), &products))
}

async fn list_bundles(State(state): State<AppState>) -> Result<Json<DataResponse<Vec<BundleResource>>>, AppError> {
    let bundles = state.repos.bundles.list(true).await?;
    let products = products_for_bundles(&state, &bundles).await?;
    let now = Utc::now();
    Ok(data(bundles.iter().map(|b| b.resource(now, &products)).collect()))
}

async fn create_bundle(
    State(state): State<AppState>,
    Json(payload): Json<BundleInput>,
) -> Result<(StatusCode, Json<DataResponse<BundleResource>>), AppError> {
    payload.validate()?;
    let bundle = Bundle::from_input(payload);
    check_references(&state, &bundle).await?;

    state.repos.bundles.create(&bundle).await?;
    info!("Bundle created: {} ({})", bundle.name, bundle.id);
    Ok((StatusCode::CREATED, data(resource(&state, &bundle).await?)))
}

async fn show_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<BundleResource>>, AppError> {
    let bundle = find_bundle(&state, id).await?;
    Ok(data(resource(&state, &bundle).await?))
}

async fn update_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BundleInput>,
) -> Result<Json<DataResponse<BundleResource>>, AppError> {
    let mut bundle = find_bundle(&state, id).await?;
    payload.validate()?;
    bundle.apply_input(payload);
    check_references(&state, &bundle).await?;

    state.repos.bundles.update(&bundle).await?;
    Ok(data(resource(&state, &bundle).await?))
}

async fn delete_bundle(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.repos.bundles.delete(id).await?;
    info!("Bundle deleted: {}", id);
    Ok(StatusCode::NO_CONTENT)
}
