use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};
use dukaan_core::identity::{normalize_email, LoginRequest, RegisterRequest, Role, User};
use dukaan_shared::ValidationErrors;
use dukaan_store::app_config::AuthConfig as AuthSettings;
use dukaan_store::Repositories;

use crate::cart::merge_guest_cart;
use crate::error::AppError;
use crate::middleware::auth::{customer_auth_middleware, issue_token, Claims};
use crate::response::{data, DataResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/me",
            get(me).route_layer(middleware::from_fn_with_state(state, customer_auth_middleware)),
        )
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<DataResponse<AuthResponse>>), AppError> {
    payload.validate()?;

    if state.repos.users.get_by_email(&payload.email).await?.is_some() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "The email has already been taken.");
        return Err(errors.into());
    }

    let user = User::new(&payload.name, &payload.email, &payload.password, Role::Customer);
    state.repos.users.create(&user).await?;
    info!("Customer registered: {}", user.id);

    merge_guest_cart(&state, &headers, user.id).await;
    let token = issue_token(&state.auth, &user)?;
    Ok((StatusCode::CREATED, data(AuthResponse { user, token })))
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<DataResponse<AuthResponse>>, AppError> {
    let user = state
        .repos
        .users
        .get_by_email(&payload.email)
        .await?
        .filter(|u| u.check_password(&payload.password))
        .ok_or_else(|| AppError::AuthenticationError("Invalid email or password".to_string()))?;

    merge_guest_cart(&state, &headers, user.id).await;
    let token = issue_token(&state.auth, &user)?;
    Ok(data(AuthResponse { user, token }))
}

async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DataResponse<User>>, AppError> {
    let id = claims
        .user_id()
        .ok_or_else(|| AppError::AuthenticationError("Invalid token subject".to_string()))?;
    let user = state
        .repos
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Account no longer exists".to_string()))?;
    Ok(data(user))
}

/// Create the configured admin account on first start.
pub async fn bootstrap_admin(repos: &Repositories, auth: &AuthSettings) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (auth.admin_email.as_deref(), auth.admin_password.as_deref()) else {
        return Ok(());
    };
    if repos.users.get_by_email(&normalize_email(email)).await?.is_some() {
        return Ok(());
    }
    if password.chars().count() < 8 {
        warn!("Admin password is shorter than 8 characters; admin account not created");
        return Ok(());
    }

    let admin = User::new("Administrator", email, password, Role::Admin);
    repos.users.create(&admin).await?;
    info!("Admin account created for {}", admin.email);
    Ok(())
}
