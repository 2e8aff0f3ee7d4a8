use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::utils::auth::{Claims, validate_jwt};
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use sea_orm::EntityTrait;
use serde::Deserialize;

/// The authenticated account, loaded once per request by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub users::Model);

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

pub fn extract_token(req: &Request) -> Option<String> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    if auth_header.is_some() {
        return auth_header;
    }

    // Try query parameter
    let query = req.uri().query().unwrap_or_default();
    serde_urlencoded::from_str::<AuthQuery>(query)
        .ok()
        .and_then(|q| q.token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || AppError::Unauthorized("Unauthorized".to_string());

    let token = extract_token(&req).ok_or_else(unauthorized)?;
    let claims: Claims =
        validate_jwt(&token, &state.config.jwt_secret).map_err(|_| unauthorized())?;

    // Revoked (logged out) tokens no longer have a row
    let stored = Tokens::find_by_id(claims.jti.clone())
        .one(&state.db)
        .await?
        .filter(|t| t.user_id == claims.sub && t.expires_at > Utc::now())
        .ok_or_else(unauthorized)?;

    let user = Users::find_by_id(stored.user_id)
        .one(&state.db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(unauthorized)?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Must run after [`auth_middleware`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = req
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.0.is_admin)
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

    if !is_admin {
        return Err(AppError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
