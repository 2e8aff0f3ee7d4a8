use crate::api::error::AppError;
use crate::api::extract::ApiQuery;
use crate::api::middleware::auth::CurrentUser;
use crate::entities::notifications::{self, NotificationType};
use crate::services::notifications::NotificationService;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub campaign_id: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notifications::Model> for NotificationResponse {
    fn from(n: notifications::Model) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            title: n.title,
            message: n.message,
            campaign_id: n.campaign_id,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}

#[utoipa::path(
    get,
    path = "/notifications",
    params(("unread_only" = Option<bool>, Query, description = "Only unread notifications")),
    responses(
        (status = 200, description = "Notifications for the current admin, newest first", body = Vec<NotificationResponse>)
    ),
    security(("jwt" = [])),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<crate::AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    let items = NotificationService::list(&state.db, &user.id, query.unread_only).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    responses((status = 200, description = "Unread notification count", body = CountResponse)),
    security(("jwt" = [])),
    tag = "notifications"
)]
pub async fn unread_count(
    State(state): State<crate::AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<CountResponse>, AppError> {
    let count = NotificationService::unread_count(&state.db, &user.id).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    post,
    path = "/notifications/generate",
    responses((status = 200, description = "Number of notifications created", body = CountResponse)),
    security(("jwt" = [])),
    tag = "notifications"
)]
pub async fn generate(
    State(state): State<crate::AppState>,
) -> Result<Json<CountResponse>, AppError> {
    let count = NotificationService::generate(
        &state.db,
        state.config.expiring_threshold_days,
        Utc::now(),
    )
    .await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "Notification not found")
    ),
    security(("jwt" = [])),
    tag = "notifications"
)]
pub async fn mark_read(
    State(state): State<crate::AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    NotificationService::mark_read(&state.db, &id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/notifications/read-all",
    responses((status = 200, description = "Number of notifications marked read", body = CountResponse)),
    security(("jwt" = [])),
    tag = "notifications"
)]
pub async fn mark_all_read(
    State(state): State<crate::AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<CountResponse>, AppError> {
    let count = NotificationService::mark_all_read(&state.db, &user.id).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    ),
    security(("jwt" = [])),
    tag = "notifications"
)]
pub async fn delete_notification(
    State(state): State<crate::AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    NotificationService::delete(&state.db, &id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
