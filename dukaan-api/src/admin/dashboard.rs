use axum::{extract::State, Json};
use chrono::{NaiveTime, Utc};
use serde::Serialize;
use dukaan_catalog::ProductSummary;
use dukaan_core::repository::{OrderFilter, OrderStats, PageRequest};
use dukaan_order::Order;

use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

const RECENT_ORDERS: u32 = 5;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    /// `orders_since` / `revenue_since` cover today (UTC).
    pub orders: OrderStats,
    pub low_stock_threshold: i32,
    pub low_stock: Vec<ProductSummary>,
    pub recent_orders: Vec<Order>,
}

pub async fn show(State(state): State<AppState>) -> Result<Json<DataResponse<Dashboard>>, AppError> {
    let today = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let threshold = state.shop.low_stock_threshold;

    let orders = state.repos.orders.stats(today).await?;
    let low_stock = state
        .repos
        .products
        .low_stock(threshold)
        .await?
        .iter()
        .map(|p| p.summary())
        .collect();
    let recent_orders = state
        .repos
        .orders
        .list(&OrderFilter::default(), PageRequest::new(Some(1), Some(RECENT_ORDERS)))
        .await?
        .items;

    Ok(data(Dashboard {
        orders,
        low_stock_threshold: threshold,
        low_stock,
        recent_orders,
    }))
}
