use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use dukaan_core::identity::{Role, User};

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.as_str().to_string(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

fn decode_token(auth: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))
}

/// `None` when no Authorization header was sent; an error when one was sent but is unusable.
async fn read_claims(parts: &mut Parts, state: &AppState) -> Result<Option<Claims>, AppError> {
    let header = Option::<TypedHeader<Authorization<Bearer>>>::from_request_parts(parts, state)
        .await
        .map_err(|_| AppError::AuthenticationError("Malformed authorization header".to_string()))?;

    match header {
        Some(TypedHeader(Authorization(bearer))) => decode_token(&state.auth, bearer.token()).map(Some),
        None => Ok(None),
    }
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Any signed-in user. Admins can use customer endpoints too.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let claims = read_claims(&mut parts, &state)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    if Role::parse(&claims.role).is_none() {
        return Err(AppError::AuthorizationError("Unknown role".to_string()));
    }

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let claims = read_claims(&mut parts, &state)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    if !claims.is_admin() {
        return Err(AppError::AuthorizationError("Admin access required".to_string()));
    }

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Optional identity for storefront routes
// ============================================================================

/// Claims of the caller if a bearer token was sent. Guests get `None`; a bad
/// token is still rejected.
pub struct MaybeClaims(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(MaybeClaims(Some(claims.clone())));
        }
        read_claims(parts, state).await.map(MaybeClaims)
    }
}
