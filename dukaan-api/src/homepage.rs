use std::collections::HashMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use dukaan_catalog::{Bundle, Homepage};

use crate::catalog::product_map;
use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(show_homepage))
}

async fn show_homepage(State(state): State<AppState>) -> Result<Json<DataResponse<Homepage>>, AppError> {
    let now = Utc::now();
    let sections = state.repos.homepage.list().await?;
    let visible: Vec<_> = sections.into_iter().filter(|s| s.is_visible(now)).collect();

    let mut bundle_ids: Vec<_> = visible.iter().flat_map(|s| s.bundle_ids()).collect();
    bundle_ids.sort();
    bundle_ids.dedup();
    let bundles = if bundle_ids.is_empty() {
        Vec::new()
    } else {
        state.repos.bundles.get_many(&bundle_ids).await?
    };

    let mut product_ids: Vec<_> = visible.iter().flat_map(|s| s.product_ids()).collect();
    product_ids.extend(bundles.iter().flat_map(Bundle::referenced_product_ids));
    let products = product_map(&state, product_ids).await?;

    let bundles: HashMap<_, _> = bundles.into_iter().map(|b| (b.id, b)).collect();
    Ok(data(Homepage::assemble(&visible, &products, &bundles, now)))
}
