use crate::api::error::AppError;
use crate::api::extract::ApiQuery;
use crate::services::analytics::{
    AnalyticsService, DayBucket, HourBucket, Overview, RegionCount, TimeRange, TopCampaign,
    UserGrowthPoint, clamp_limit,
};
use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub days: Option<i64>,
    pub campaign_id: Option<String>,
}

impl RangeQuery {
    fn range(&self) -> TimeRange {
        TimeRange::last_days(self.days, Utc::now())
    }
}

#[derive(Deserialize)]
pub struct TopQuery {
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/analytics/overview",
    responses(
        (status = 200, description = "Dashboard totals", body = Overview),
        (status = 403, description = "Administrator access required")
    ),
    security(("jwt" = [])),
    tag = "analytics"
)]
pub async fn overview(State(state): State<crate::AppState>) -> Result<Json<Overview>, AppError> {
    Ok(Json(AnalyticsService::overview(&state.db).await?))
}

#[utoipa::path(
    get,
    path = "/analytics/regions",
    params(
        ("days" = Option<i64>, Query, description = "Window in days (1-365, default 30)"),
        ("campaign_id" = Option<String>, Query, description = "Restrict to one campaign")
    ),
    responses((status = 200, description = "Scans per region", body = Vec<RegionCount>)),
    security(("jwt" = [])),
    tag = "analytics"
)]
pub async fn regions(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Vec<RegionCount>>, AppError> {
    Ok(Json(
        AnalyticsService::regional_distribution(
            &state.db,
            query.campaign_id.as_deref(),
            query.range(),
        )
        .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/analytics/hourly",
    params(
        ("days" = Option<i64>, Query, description = "Window in days (1-365, default 30)"),
        ("campaign_id" = Option<String>, Query, description = "Restrict to one campaign")
    ),
    responses((status = 200, description = "Scans per hour of day (UTC)", body = Vec<HourBucket>)),
    security(("jwt" = [])),
    tag = "analytics"
)]
pub async fn hourly(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Vec<HourBucket>>, AppError> {
    Ok(Json(
        AnalyticsService::hourly_histogram(&state.db, query.campaign_id.as_deref(), query.range())
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/analytics/daily",
    params(
        ("days" = Option<i64>, Query, description = "Window in days (1-365, default 30)"),
        ("campaign_id" = Option<String>, Query, description = "Restrict to one campaign")
    ),
    responses((status = 200, description = "Scans per day (UTC)", body = Vec<DayBucket>)),
    security(("jwt" = [])),
    tag = "analytics"
)]
pub async fn daily(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Vec<DayBucket>>, AppError> {
    Ok(Json(
        AnalyticsService::daily_scans(&state.db, query.campaign_id.as_deref(), query.range())
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/analytics/top-campaigns",
    params(("limit" = Option<u64>, Query, description = "Number of campaigns (1-100, default 10)")),
    responses((status = 200, description = "Campaigns by scan count", body = Vec<TopCampaign>)),
    security(("jwt" = [])),
    tag = "analytics"
)]
pub async fn top_campaigns(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<TopQuery>,
) -> Result<Json<Vec<TopCampaign>>, AppError> {
    Ok(Json(
        AnalyticsService::top_campaigns(&state.db, clamp_limit(query.limit)).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/analytics/user-growth",
    params(("days" = Option<i64>, Query, description = "Window in days (1-365, default 30)")),
    responses((status = 200, description = "New and cumulative users per day", body = Vec<UserGrowthPoint>)),
    security(("jwt" = [])),
    tag = "analytics"
)]
pub async fn user_growth(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Vec<UserGrowthPoint>>, AppError> {
    Ok(Json(
        AnalyticsService::user_growth(&state.db, query.range()).await?,
    ))
}
