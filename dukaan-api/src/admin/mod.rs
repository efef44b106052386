use axum::{middleware, routing::get, Router};

use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

pub mod analytics;
pub mod catalog;
pub mod content;
pub mod coupons;
pub mod dashboard;
pub mod orders;

/// Everything under `/api/admin`, behind the admin JWT check.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/products", catalog::product_routes())
        .nest("/bundles", catalog::bundle_routes())
        .nest("/coupons", coupons::routes())
        .nest("/orders", orders::routes())
        .nest("/homepage/sections", content::routes())
        .route("/analytics/summary", get(analytics::summary))
        .route("/dashboard", get(dashboard::show))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
