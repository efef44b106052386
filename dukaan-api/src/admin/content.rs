use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use dukaan_catalog::homepage::SectionInput;
use dukaan_catalog::HomepageSection;
use dukaan_shared::ValidationErrors;

use crate::error::AppError;
use crate::response::{data, DataResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sections).post(create_section))
        .route("/reorder", put(reorder_sections))
        .route("/{id}", put(update_section).delete(delete_section))
}

async fn list_sections(State(state): State<AppState>) -> Result<Json<DataResponse<Vec<HomepageSection>>>, AppError> {
    Ok(data(state.repos.homepage.list().await?))
}

async fn create_section(
    State(state): State<AppState>,
    Json(payload): Json<SectionInput>,
) -> Result<(StatusCode, Json<DataResponse<HomepageSection>>), AppError> {
    payload.validate()?;
    let place_last = payload.position.is_none();
    let mut section = HomepageSection::from_input(payload);
    if place_last {
        let existing = state.repos.homepage.list().await?;
        section.position = existing.iter().map(|s| s.position + 1).max().unwrap_or(0);
    }
    state.repos.homepage.create(&section).await?;
    Ok((StatusCode::CREATED, data(section)))
}

async fn update_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SectionInput>,
) -> Result<Json<DataResponse<HomepageSection>>, AppError> {
    let mut section = state
        .repos
        .homepage
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Homepage section not found: {}", id)))?;
    payload.validate()?;
    section.apply_input(payload);
    state.repos.homepage.update(&section).await?;
    Ok(data(section))
}

async fn delete_section(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.repos.homepage.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_sections(
    State(state): State<AppState>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<DataResponse<Vec<HomepageSection>>>, AppError> {
    let mut seen = payload.ids.clone();
    seen.sort();
    seen.dedup();
    if payload.ids.is_empty() || seen.len() != payload.ids.len() {
        let mut errors = ValidationErrors::new();
        errors.add("ids", "The ids must be a non-empty list without duplicates.");
        return Err(errors.into());
    }

    state.repos.homepage.reorder(&payload.ids).await?;
    Ok(data(state.repos.homepage.list().await?))
}
