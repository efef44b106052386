use std::collections::HashMap;

use uuid::Uuid;
use dukaan_catalog::{Bundle, Product};
use dukaan_order::{Cart, CatalogSnapshot, LineKind};

use crate::error::AppError;
use crate::state::AppState;

pub(crate) async fn product_map(state: &AppState, mut ids: Vec<Uuid>) -> Result<HashMap<Uuid, Product>, AppError> {
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let products = state.repos.products.get_many(&ids).await?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

/// Products referenced by any of `bundles`.
pub(crate) async fn products_for_bundles(
    state: &AppState,
    bundles: &[Bundle],
) -> Result<HashMap<Uuid, Product>, AppError> {
    let ids = bundles.iter().flat_map(Bundle::referenced_product_ids).collect();
    product_map(state, ids).await
}

/// Everything needed to price `cart`.
pub(crate) async fn snapshot_for(state: &AppState, cart: &Cart) -> Result<CatalogSnapshot, AppError> {
    let mut product_ids = Vec::new();
    let mut bundle_ids = Vec::new();
    for line in &cart.lines {
        match &line.kind {
            LineKind::Product { product_id } => product_ids.push(*product_id),
            LineKind::Bundle { bundle_id, .. } => bundle_ids.push(*bundle_id),
        }
    }

    let bundles = if bundle_ids.is_empty() {
        Vec::new()
    } else {
        bundle_ids.sort();
        bundle_ids.dedup();
        state.repos.bundles.get_many(&bundle_ids).await?
    };
    product_ids.extend(bundles.iter().flat_map(Bundle::referenced_product_ids));
    let products = product_map(state, product_ids).await?;

    Ok(CatalogSnapshot::new(products.into_values().collect(), bundles))
}
