use crate::api::error::AppError;
use crate::entities::campaigns::CampaignStatus;
use crate::entities::{prelude::*, *};
use crate::services::campaigns::CampaignService;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use utoipa::ToSchema;

pub const DEFAULT_DAYS: i64 = 30;
pub const MAX_DAYS: i64 = 365;
pub const DEFAULT_TOP_LIMIT: u64 = 10;
pub const MAX_TOP_LIMIT: u64 = 100;
const RECENT_SCANS: u64 = 20;

/// Half-open UTC window `[start, end)` covering whole days up to `end`.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The last `days` calendar days including today, clamped to `1..=MAX_DAYS`.
    pub fn last_days(days: Option<i64>, now: DateTime<Utc>) -> Self {
        let days = clamp_days(days);
        let first_day = now.date_naive() - Duration::days(days - 1);
        Self {
            start: start_of_day(first_day),
            end: now + Duration::seconds(1),
        }
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut day = self.start.date_naive();
        let last = (self.end - Duration::seconds(1)).date_naive();
        while day <= last {
            days.push(day);
            day += Duration::days(1);
        }
        days
    }
}

pub fn clamp_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT)
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Overview {
    pub total_campaigns: u64,
    pub active_campaigns: u64,
    pub expired_campaigns: u64,
    pub total_scans: u64,
    pub scans_today: u64,
    pub total_users: u64,
    pub active_users: u64,
}

#[derive(Debug, Serialize, ToSchema, FromQueryResult, PartialEq, Eq)]
pub struct RegionCount {
    pub region: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct HourBucket {
    pub hour: u32,
    pub count: u64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserGrowthPoint {
    pub date: NaiveDate,
    pub new_users: u64,
    pub total_users: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopCampaign {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: CampaignStatus,
    pub scan_count: i32,
    pub scan_limit: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentScan {
    pub id: String,
    pub region: String,
    pub scanned_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignAnalytics {
    pub campaign_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub scan_count: i32,
    pub scan_limit: Option<i32>,
    pub regions: Vec<RegionCount>,
    pub hourly: Vec<HourBucket>,
    pub daily: Vec<DayBucket>,
    pub recent_scans: Vec<RecentScan>,
}

/// Counts timestamps per hour of day; always returns 24 buckets.
pub fn bucket_by_hour(timestamps: &[DateTime<Utc>]) -> Vec<HourBucket> {
    let mut counts = [0u64; 24];
    for ts in timestamps {
        counts[ts.hour() as usize] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(hour, count)| HourBucket {
            hour: hour as u32,
            count: *count,
        })
        .collect()
}

/// Counts timestamps per UTC date over `days`, zero-filling missing dates.
pub fn bucket_by_day(timestamps: &[DateTime<Utc>], days: &[NaiveDate]) -> Vec<DayBucket> {
    let mut counts: BTreeMap<NaiveDate, u64> = days.iter().map(|d| (*d, 0)).collect();
    for ts in timestamps {
        if let Some(count) = counts.get_mut(&ts.date_naive()) {
            *count += 1;
        }
    }
    counts
        .into_iter()
        .map(|(date, count)| DayBucket { date, count })
        .collect()
}

/// Running user totals starting from the users that existed before the window.
pub fn cumulative_growth(
    created: &[DateTime<Utc>],
    days: &[NaiveDate],
    baseline: u64,
) -> Vec<UserGrowthPoint> {
    let mut total = baseline;
    bucket_by_day(created, days)
        .into_iter()
        .map(|bucket| {
            total += bucket.count;
            UserGrowthPoint {
                date: bucket.date,
                new_users: bucket.count,
                total_users: total,
            }
        })
        .collect()
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub async fn overview<C: ConnectionTrait>(db: &C) -> Result<Overview, AppError> {
        let now = Utc::now();
        CampaignService::expire_due(db, now).await?;

        let total_campaigns = Campaigns::find().count(db).await?;
        let active_campaigns = Campaigns::find()
            .filter(campaigns::Column::Status.eq(CampaignStatus::Active))
            .count(db)
            .await?;
        let total_scans = ScanEvents::find().count(db).await?;
        let scans_today = ScanEvents::find()
            .filter(scan_events::Column::ScannedAt.gte(start_of_day(now.date_naive())))
            .count(db)
            .await?;
        let total_users = Users::find().count(db).await?;
        let active_users = Users::find()
            .filter(users::Column::IsActive.eq(true))
            .count(db)
            .await?;

        Ok(Overview {
            total_campaigns,
            active_campaigns,
            expired_campaigns: total_campaigns.saturating_sub(active_campaigns),
            total_scans,
            scans_today,
            total_users,
            active_users,
        })
    }

    pub async fn regional_distribution<C: ConnectionTrait>(
        db: &C,
        campaign_id: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<RegionCount>, AppError> {
        let mut rows = Self::events_in(campaign_id, range)
            .select_only()
            .column(scan_events::Column::Region)
            .column_as(Expr::col(scan_events::Column::Id).count(), "count")
            .group_by(scan_events::Column::Region)
            .into_model::<RegionCount>()
            .all(db)
            .await?;

        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.region.cmp(&b.region)));
        Ok(rows)
    }

    pub async fn hourly_histogram<C: ConnectionTrait>(
        db: &C,
        campaign_id: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<HourBucket>, AppError> {
        let timestamps = Self::scan_timestamps(db, campaign_id, range).await?;
        Ok(bucket_by_hour(&timestamps))
    }

    pub async fn daily_scans<C: ConnectionTrait>(
        db: &C,
        campaign_id: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<DayBucket>, AppError> {
        let timestamps = Self::scan_timestamps(db, campaign_id, range).await?;
        Ok(bucket_by_day(&timestamps, &range.days()))
    }

    pub async fn top_campaigns<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<TopCampaign>, AppError> {
        CampaignService::expire_due(db, Utc::now()).await?;

        let campaigns = Campaigns::find()
            .order_by_desc(campaigns::Column::ScanCount)
            .order_by_asc(campaigns::Column::Name)
            .limit(limit)
            .all(db)
            .await?;

        Ok(campaigns
            .into_iter()
            .map(|c| TopCampaign {
                id: c.id,
                name: c.name,
                category: c.category,
                status: c.status,
                scan_count: c.scan_count,
                scan_limit: c.scan_limit,
            })
            .collect())
    }

    pub async fn user_growth<C: ConnectionTrait>(
        db: &C,
        range: TimeRange,
    ) -> Result<Vec<UserGrowthPoint>, AppError> {
        let baseline = Users::find()
            .filter(users::Column::CreatedAt.lt(range.start))
            .count(db)
            .await?;

        let created = Users::find()
            .select_only()
            .column(users::Column::CreatedAt)
            .filter(users::Column::CreatedAt.gte(range.start))
            .filter(users::Column::CreatedAt.lt(range.end))
            .into_tuple::<DateTime<Utc>>()
            .all(db)
            .await?;

        Ok(cumulative_growth(&created, &range.days(), baseline))
    }

    pub async fn campaign_summary<C: ConnectionTrait>(
        db: &C,
        campaign_id: &str,
        range: TimeRange,
    ) -> Result<CampaignAnalytics, AppError> {
        let campaign = CampaignService::get(db, campaign_id).await?;
        info!("📊 Building analytics for campaign {}", campaign.id);

        let regions = Self::regional_distribution(db, Some(campaign_id), range).await?;
        let timestamps = Self::scan_timestamps(db, Some(campaign_id), range).await?;

        let recent_scans = ScanEvents::find()
            .filter(scan_events::Column::CampaignId.eq(campaign_id))
            .order_by_desc(scan_events::Column::ScannedAt)
            .limit(RECENT_SCANS)
            .all(db)
            .await?
            .into_iter()
            .map(|e| RecentScan {
                id: e.id,
                region: e.region,
                scanned_at: e.scanned_at,
                user_agent: e.user_agent,
            })
            .collect();

        Ok(CampaignAnalytics {
            campaign_id: campaign.id,
            name: campaign.name,
            status: campaign.status,
            scan_count: campaign.scan_count,
            scan_limit: campaign.scan_limit,
            regions,
            hourly: bucket_by_hour(&timestamps),
            daily: bucket_by_day(&timestamps, &range.days()),
            recent_scans,
        })
    }

    fn events_in(campaign_id: Option<&str>, range: TimeRange) -> Select<ScanEvents> {
        let mut query = ScanEvents::find()
            .filter(scan_events::Column::ScannedAt.gte(range.start))
            .filter(scan_events::Column::ScannedAt.lt(range.end));
        if let Some(id) = campaign_id {
            query = query.filter(scan_events::Column::CampaignId.eq(id));
        }
        query
    }

    async fn scan_timestamps<C: ConnectionTrait>(
        db: &C,
        campaign_id: Option<&str>,
        range: TimeRange,
    ) -> Result<Vec<DateTime<Utc>>, AppError> {
        Ok(Self::events_in(campaign_id, range)
            .select_only()
            .column(scan_events::Column::ScannedAt)
            .into_tuple::<DateTime<Utc>>()
            .all(db)
            .await?)
    }
}
