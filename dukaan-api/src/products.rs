use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use dukaan_catalog::{ProductError, ProductSummary};
use dukaan_core::repository::{PageRequest, ProductFilter};

use crate::error::AppError;
use crate::response::{data, paginated, DataResponse, PageResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub on_sale: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Storefront product page: the listing card plus the long description.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{slug}", get(show_product))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<PageResponse<ProductSummary>>, AppError> {
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        search: query.search.filter(|s| !s.trim().is_empty()),
        on_sale: query.on_sale,
        include_inactive: false,
        max_stock: None,
    };
    let page = state
        .repos
        .products
        .list(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(paginated(page.map(|p| p.summary())))
}

async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<DataResponse<ProductDetail>>, AppError> {
    let product = state
        .repos
        .products
        .get_by_slug(&slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ProductError::NotFound(slug))?;

    Ok(data(ProductDetail {
        summary: product.summary(),
        description: product.description,
    }))
}
