use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    routing::post,
    Json, RequestExt, Router,
};
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use dukaan_core::analytics::{anonymize_ip, TrackEvent};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(track))
}

/// Accept a storefront beacon. The write happens on the tracking worker; a
/// full queue drops the event and the client still gets 202.
async fn track(State(state): State<AppState>, req: Request) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let ip_hash = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| anonymize_ip(&addr.ip().to_string(), &state.shop.ip_salt));
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Json(event) = req
        .extract::<Json<TrackEvent>, _>()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    event.validate()?;

    let visit = event.into_visit(ip_hash, user_agent, Utc::now());
    match state.tracking.try_send(visit) {
        Ok(()) => state.metrics.tracking("accepted"),
        Err(TrySendError::Full(_)) => {
            state.metrics.tracking("dropped");
            warn!("Tracking queue full; event dropped");
        }
        Err(TrySendError::Closed(_)) => {
            state.metrics.tracking("dropped");
            warn!("Tracking worker is not running; event dropped");
        }
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}
