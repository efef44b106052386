use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, NaiveTime, Utc};
use serde::Deserialize;
use dukaan_core::analytics::VisitSummary;
use dukaan_shared::ValidationErrors;

use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 90;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<u32>,
}

/// Traffic over the last `days` UTC days, today included.
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DataResponse<VisitSummary>>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_DAYS);
    if !(1..=MAX_DAYS).contains(&days) {
        let mut errors = ValidationErrors::new();
        errors.add("days", format!("The days must be between 1 and {}.", MAX_DAYS));
        return Err(errors.into());
    }

    let to = Utc::now().date_naive();
    let from = to - Duration::days(days as i64 - 1);
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();

    let visits = state.repos.visits.list_between(start, end).await?;
    Ok(data(VisitSummary::build(&visits, from, to)))
}
