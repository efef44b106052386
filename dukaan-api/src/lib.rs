use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod admin;
pub mod auth;
pub mod bundles;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod homepage;
pub mod metrics;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod response;
pub mod state;
pub mod tracking;
pub mod webhooks;
pub mod worker;

pub use state::AppState;

use crate::cart::CART_TOKEN_HEADER;
use crate::middleware::rate_limit_middleware;

pub fn app(state: AppState) -> Router {
    let cart_token = HeaderName::from_static(CART_TOKEN_HEADER);
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.cors_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::USER_AGENT,
            cart_token.clone(),
        ])
        .expose_headers([cart_token]);

    let api = Router::new()
        .nest("/auth", auth::routes(state.clone()))
        .nest("/products", products::routes())
        .nest("/bundles", bundles::routes())
        .nest("/cart", cart::routes())
        .nest("/orders", orders::routes())
        .nest("/payments", webhooks::routes())
        .nest("/homepage", homepage::routes())
        .nest("/track", tracking::routes())
        .nest("/admin", admin::routes(state.clone()));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(state.clone(), metrics::track_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        Any.into()
    } else {
        AllowOrigin::list(parsed)
    }
}
