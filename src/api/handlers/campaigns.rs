use crate::api::error::AppError;
use crate::api::extract::ApiQuery;
use crate::api::middleware::auth::CurrentUser;
use crate::entities::campaigns::{self, CampaignStatus};
use crate::services::analytics::{AnalyticsService, CampaignAnalytics, TimeRange};
use crate::services::campaigns::{CampaignFilter, CampaignPatch, CampaignService, NewCampaign};
use crate::services::icons::{mime_for_key, validate_icon};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

// ── Request / Response Types ──────────────────────────────────────────

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub scan_limit: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub border_style: Option<String>,
    #[validate(length(max = 2048))]
    pub target_url: Option<String>,
}

/// Absent fields are left unchanged; `null` clears nullable fields.
#[derive(Deserialize, ToSchema, Default)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<i32>)]
    pub scan_limit: Option<Option<i32>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub border_style: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub target_url: Option<Option<String>>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
pub struct CampaignListQuery {
    pub status: Option<CampaignStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct CampaignAnalyticsQuery {
    pub days: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct CampaignResponse {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub scan_count: i32,
    pub scan_limit: Option<i32>,
    pub status: CampaignStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: String,
    pub icon_url: Option<String>,
    pub border_style: String,
    pub target_url: Option<String>,
    /// Content to encode in the campaign's QR code
    pub qr_payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignResponse {
    pub fn from_model(campaign: campaigns::Model, public_base_url: &str) -> Self {
        Self {
            qr_payload: CampaignService::qr_payload(public_base_url, &campaign.id),
            icon_url: campaign
                .icon_path
                .as_ref()
                .map(|_| format!("/campaigns/{}/icon", campaign.id)),
            id: campaign.id,
            name: campaign.name,
            category: campaign.category,
            description: campaign.description,
            scan_count: campaign.scan_count,
            scan_limit: campaign.scan_limit,
            status: campaign.status,
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            created_by: campaign.created_by,
            border_style: campaign.border_style,
            target_url: campaign.target_url,
            created_at: campaign.created_at,
            updated_at: campaign.updated_at,
        }
    }
}

// ── Endpoints ─────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/campaigns",
    params(
        ("status" = Option<String>, Query, description = "active or expired"),
        ("category" = Option<String>, Query, description = "Exact category"),
        ("search" = Option<String>, Query, description = "Name substring")
    ),
    responses(
        (status = 200, description = "Campaigns, newest first", body = Vec<CampaignResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn list_campaigns(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<CampaignListQuery>,
) -> Result<Json<Vec<CampaignResponse>>, AppError> {
    let campaigns = CampaignService::list(
        &state.db,
        CampaignFilter {
            status: query.status,
            category: query.category,
            search: query.search,
        },
    )
    .await?;

    let base = &state.config.public_base_url;
    Ok(Json(
        campaigns
            .into_iter()
            .map(|c| CampaignResponse::from_model(c, base))
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = CampaignResponse),
        (status = 400, description = "Invalid campaign"),
        (status = 403, description = "Administrator access required")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn create_campaign(
    State(state): State<crate::AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), AppError> {
    payload.validate()?;

    let campaign = CampaignService::create(
        &state.db,
        &user.id,
        NewCampaign {
            name: payload.name,
            category: payload.category,
            description: payload.description,
            scan_limit: payload.scan_limit,
            start_date: payload.start_date,
            end_date: payload.end_date,
            border_style: payload.border_style,
            target_url: payload.target_url,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CampaignResponse::from_model(
            campaign,
            &state.config.public_base_url,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/campaigns/categories",
    responses(
        (status = 200, description = "Distinct campaign categories", body = Vec<String>)
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(CampaignService::categories(&state.db).await?))
}

#[utoipa::path(
    get,
    path = "/campaigns/{id}",
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign detail", body = CampaignResponse),
        (status = 404, description = "Campaign not found")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn get_campaign(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = CampaignService::get(&state.db, &id).await?;
    Ok(Json(CampaignResponse::from_model(
        campaign,
        &state.config.public_base_url,
    )))
}

#[utoipa::path(
    put,
    path = "/campaigns/{id}",
    request_body = UpdateCampaignRequest,
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign updated", body = CampaignResponse),
        (status = 400, description = "Invalid update"),
        (status = 404, description = "Campaign not found")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn update_campaign(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = CampaignService::update(
        &state.db,
        &id,
        CampaignPatch {
            name: payload.name,
            category: payload.category,
            description: payload.description,
            scan_limit: payload.scan_limit,
            start_date: payload.start_date,
            end_date: payload.end_date,
            border_style: payload.border_style,
            target_url: payload.target_url,
        },
    )
    .await?;

    Ok(Json(CampaignResponse::from_model(
        campaign,
        &state.config.public_base_url,
    )))
}

#[utoipa::path(
    delete,
    path = "/campaigns/{id}",
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign deleted"),
        (status = 404, description = "Campaign not found")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn delete_campaign(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let campaign = CampaignService::delete(&state.db, &id).await?;

    if let Some(icon) = campaign.icon_path
        && let Err(e) = state.icons.delete(&icon).await
    {
        warn!("Failed to remove icon {} of deleted campaign: {}", icon, e);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/campaigns/{id}/icon",
    params(("id" = String, Path, description = "Campaign ID")),
    request_body(content = Object, description = "Icon image file", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Icon stored", body = CampaignResponse),
        (status = 400, description = "Invalid image"),
        (status = 404, description = "Campaign not found")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn upload_icon(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = CampaignService::find(&state.db, &id).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .ok_or_else(|| AppError::BadRequest("No file found in request".to_string()))?;

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .to_vec();

    if data.len() > state.config.max_icon_size {
        return Err(AppError::PayloadTooLarge(format!(
            "Icon exceeds {} bytes",
            state.config.max_icon_size
        )));
    }
    let (_mime, extension) = validate_icon(&data, state.config.max_icon_size)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let key = format!("{}.{}", campaign.id, extension);
    state
        .icons
        .save(&key, data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store icon: {}", e)))?;

    if let Some(previous) = campaign.icon_path.as_deref()
        && previous != key
        && let Err(e) = state.icons.delete(previous).await
    {
        warn!("Failed to remove previous icon {}: {}", previous, e);
    }

    let updated = CampaignService::set_icon(&state.db, &id, Some(key)).await?;
    info!("🖼️ Icon updated for campaign {}", updated.id);

    Ok(Json(CampaignResponse::from_model(
        updated,
        &state.config.public_base_url,
    )))
}

#[utoipa::path(
    get,
    path = "/campaigns/{id}/icon",
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Icon image"),
        (status = 404, description = "Icon not found")
    ),
    tag = "campaigns"
)]
pub async fn get_icon(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let campaign = CampaignService::find(&state.db, &id).await?;
    let key = campaign
        .icon_path
        .ok_or_else(|| AppError::NotFound("Icon not found".to_string()))?;

    let data = state
        .icons
        .load(&key)
        .await
        .map_err(|_| AppError::NotFound("Icon not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, mime_for_key(&key)),
            (header::CACHE_CONTROL, "public, max-age=300"),
        ],
        data,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/campaigns/{id}/analytics",
    params(
        ("id" = String, Path, description = "Campaign ID"),
        ("days" = Option<i64>, Query, description = "Window in days (1-365, default 30)")
    ),
    responses(
        (status = 200, description = "Campaign analytics", body = CampaignAnalytics),
        (status = 404, description = "Campaign not found")
    ),
    security(("jwt" = [])),
    tag = "campaigns"
)]
pub async fn campaign_analytics(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<CampaignAnalyticsQuery>,
) -> Result<Json<CampaignAnalytics>, AppError> {
    let range = TimeRange::last_days(query.days, Utc::now());
    Ok(Json(
        AnalyticsService::campaign_summary(&state.db, &id, range).await?,
    ))
}
