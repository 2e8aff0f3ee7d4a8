use crate::api::error::AppError;
use crate::api::handlers::auth::UserResponse;
use crate::services::users::UserService;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters"))]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserResponse>),
        (status = 403, description = "Administrator access required")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = UserService::list_users(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 409, description = "Username already exists")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.validate()?;
    let user = UserService::create_user(
        &state.db,
        payload.username.trim(),
        &payload.password,
        payload.is_admin,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    put,
    path = "/users/{id}/active",
    request_body = SetActiveRequest,
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Would leave no active user"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn set_active(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = UserService::set_active(&state.db, &id, payload.is_active).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/users/{id}/admin",
    request_body = SetAdminRequest,
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Would leave no active administrator"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn set_admin(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SetAdminRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = UserService::set_admin(&state.db, &id, payload.is_admin).await?;
    Ok(Json(user.into()))
}
