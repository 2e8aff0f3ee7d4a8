use crate::api::error::AppError;
use crate::entities::campaigns::CampaignStatus;
use crate::entities::{prelude::*, *};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

pub const BORDER_STYLES: &[&str] = &["none", "solid", "rounded", "dashed", "dotted", "double"];
pub const DEFAULT_BORDER_STYLE: &str = "solid";

/// Fields supplied when creating a campaign.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub scan_limit: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub border_style: Option<String>,
    pub target_url: Option<String>,
}

/// Partial update. The outer `Option` means "leave unchanged"; for nullable
/// columns the inner `None` clears the value.
#[derive(Debug, Clone, Default)]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub scan_limit: Option<Option<i32>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub border_style: Option<String>,
    pub target_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub status: Option<CampaignStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Status implied by the campaign's dates and counters at `now`.
pub fn derive_status(campaign: &campaigns::Model, now: DateTime<Utc>) -> CampaignStatus {
    if campaign.end_date <= now || limit_reached(campaign.scan_count, campaign.scan_limit) {
        CampaignStatus::Expired
    } else {
        CampaignStatus::Active
    }
}

pub fn limit_reached(scan_count: i32, scan_limit: Option<i32>) -> bool {
    matches!(scan_limit, Some(limit) if scan_count >= limit)
}

pub struct CampaignService;

impl CampaignService {
    /// Flips every overdue or exhausted active campaign to expired in one statement.
    pub async fn expire_due<C: ConnectionTrait>(db: &C, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = Campaigns::update_many()
            .col_expr(campaigns::Column::Status, Expr::value(CampaignStatus::Expired))
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
            .filter(campaigns::Column::Status.eq(CampaignStatus::Active))
            .filter(
                Condition::any()
                    .add(campaigns::Column::EndDate.lte(now))
                    .add(
                        Condition::all()
                            .add(campaigns::Column::ScanLimit.is_not_null())
                            .add(
                                Expr::col(campaigns::Column::ScanCount)
                                    .gte(Expr::col(campaigns::Column::ScanLimit)),
                            ),
                    ),
            )
            .exec(db)
            .await?;

        if result.rows_affected > 0 {
            info!("⏰ Expired {} campaign(s)", result.rows_affected);
        }
        Ok(result.rows_affected)
    }

    /// Persists an implicit transition to expired; other differences are left alone.
    pub async fn refresh_status<C: ConnectionTrait>(
        db: &C,
        campaign: campaigns::Model,
        now: DateTime<Utc>,
    ) -> Result<campaigns::Model, AppError> {
        let derived = derive_status(&campaign, now);
        // Reads only ever move a campaign forward to expired
        if derived == campaign.status || derived != CampaignStatus::Expired {
            return Ok(campaign);
        }

        info!(
            "🔁 Campaign {} status {:?} -> {:?}",
            campaign.id, campaign.status, derived
        );
        let mut model: campaigns::ActiveModel = campaign.into();
        model.status = Set(derived);
        model.updated_at = Set(now);
        Ok(model.update(db).await?)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        created_by: &str,
        input: NewCampaign,
    ) -> Result<campaigns::Model, AppError> {
        let now = Utc::now();
        let border_style = input
            .border_style
            .unwrap_or_else(|| DEFAULT_BORDER_STYLE.to_string());

        let draft = campaigns::Model {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            description: normalize_optional(input.description),
            scan_count: 0,
            scan_limit: input.scan_limit,
            status: CampaignStatus::Active,
            start_date: input.start_date,
            end_date: input.end_date,
            created_by: created_by.to_string(),
            icon_path: None,
            border_style,
            target_url: normalize_optional(input.target_url),
            created_at: now,
            updated_at: now,
        };
        validate(&draft)?;

        let model = campaigns::ActiveModel {
            id: Set(draft.id.clone()),
            name: Set(draft.name.clone()),
            category: Set(draft.category.clone()),
            description: Set(draft.description.clone()),
            scan_count: Set(0),
            scan_limit: Set(draft.scan_limit),
            status: Set(derive_status(&draft, now)),
            start_date: Set(draft.start_date),
            end_date: Set(draft.end_date),
            created_by: Set(draft.created_by.clone()),
            icon_path: Set(None),
            border_style: Set(draft.border_style.clone()),
            target_url: Set(draft.target_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let campaign = model.insert(db).await?;
        info!("📣 Campaign '{}' created ({})", campaign.name, campaign.id);
        Ok(campaign)
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        filter: CampaignFilter,
    ) -> Result<Vec<campaigns::Model>, AppError> {
        Self::expire_due(db, Utc::now()).await?;

        let mut query = Campaigns::find();
        if let Some(status) = filter.status {
            query = query.filter(campaigns::Column::Status.eq(status));
        }
        if let Some(category) = filter.category.filter(|c| !c.trim().is_empty()) {
            query = query.filter(campaigns::Column::Category.eq(category.trim()));
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            query = query.filter(campaigns::Column::Name.contains(search.trim()));
        }

        Ok(query
            .order_by_desc(campaigns::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn get<C: ConnectionTrait>(db: &C, id: &str) -> Result<campaigns::Model, AppError> {
        let campaign = Self::find(db, id).await?;
        Self::refresh_status(db, campaign, Utc::now()).await
    }

    pub async fn find<C: ConnectionTrait>(db: &C, id: &str) -> Result<campaigns::Model, AppError> {
        Campaigns::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))
    }

    pub async fn update<C: TransactionTrait>(
        db: &C,
        id: &str,
        patch: CampaignPatch,
    ) -> Result<campaigns::Model, AppError> {
        let txn = db.begin().await?;
        let existing = Self::find(&txn, id).await?;
        let now = Utc::now();

        let mut merged = existing.clone();
        if let Some(name) = patch.name {
            merged.name = name.trim().to_string();
        }
        if let Some(category) = patch.category {
            merged.category = category.trim().to_string();
        }
        if let Some(description) = patch.description {
            merged.description = normalize_optional(description);
        }
        if let Some(scan_limit) = patch.scan_limit {
            merged.scan_limit = scan_limit;
        }
        if let Some(start_date) = patch.start_date {
            merged.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            merged.end_date = end_date;
        }
        if let Some(border_style) = patch.border_style {
            merged.border_style = border_style;
        }
        if let Some(target_url) = patch.target_url {
            merged.target_url = normalize_optional(target_url);
        }
        validate(&merged)?;

        if let Some(limit) = merged.scan_limit
            && limit < existing.scan_count
        {
            return Err(AppError::BadRequest(format!(
                "Scan limit cannot be lower than the current scan count ({})",
                existing.scan_count
            )));
        }

        let mut model: campaigns::ActiveModel = existing.into();
        model.name = Set(merged.name.clone());
        model.category = Set(merged.category.clone());
        model.description = Set(merged.description.clone());
        model.scan_limit = Set(merged.scan_limit);
        model.start_date = Set(merged.start_date);
        model.end_date = Set(merged.end_date);
        model.border_style = Set(merged.border_style.clone());
        model.target_url = Set(merged.target_url.clone());
        model.status = Set(derive_status(&merged, now));
        model.updated_at = Set(now);

        let updated = model.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Removes the campaign together with its scan history and notifications.
    pub async fn delete<C: TransactionTrait>(db: &C, id: &str) -> Result<campaigns::Model, AppError> {
        let txn = db.begin().await?;
        let campaign = Self::find(&txn, id).await?;

        ScanEvents::delete_many()
            .filter(scan_events::Column::CampaignId.eq(id))
            .exec(&txn)
            .await?;
        Notifications::delete_many()
            .filter(notifications::Column::CampaignId.eq(id))
            .exec(&txn)
            .await?;
        Campaigns::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        info!("🗑️ Campaign '{}' deleted ({})", campaign.name, campaign.id);
        Ok(campaign)
    }

    pub async fn set_icon<C: ConnectionTrait>(
        db: &C,
        id: &str,
        icon_path: Option<String>,
    ) -> Result<campaigns::Model, AppError> {
        let campaign = Self::find(db, id).await?;
        let mut model: campaigns::ActiveModel = campaign.into();
        model.icon_path = Set(icon_path);
        model.updated_at = Set(Utc::now());
        Ok(model.update(db).await?)
    }

    pub async fn categories<C: ConnectionTrait>(db: &C) -> Result<Vec<String>, AppError> {
        Ok(Campaigns::find()
            .select_only()
            .column(campaigns::Column::Category)
            .distinct()
            .order_by_asc(campaigns::Column::Category)
            .into_tuple::<String>()
            .all(db)
            .await?)
    }

    /// The URL encoded into the campaign's QR code.
    pub fn qr_payload(public_base_url: &str, campaign_id: &str) -> String {
        format!(
            "{}/scan/{}",
            public_base_url.trim_end_matches('/'),
            campaign_id
        )
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate(campaign: &campaigns::Model) -> Result<(), AppError> {
    let bad = |msg: &str| Err(AppError::BadRequest(msg.to_string()));

    if campaign.name.is_empty() || campaign.name.chars().count() > 200 {
        return bad("Name must be between 1 and 200 characters");
    }
    if campaign.category.is_empty() || campaign.category.chars().count() > 100 {
        return bad("Category must be between 1 and 100 characters");
    }
    if campaign
        .description
        .as_ref()
        .is_some_and(|d| d.chars().count() > 2000)
    {
        return bad("Description must be at most 2000 characters");
    }
    if campaign.end_date <= campaign.start_date {
        return bad("End date must be after start date");
    }
    if let Some(limit) = campaign.scan_limit
        && limit <= 0
    {
        return bad("Scan limit must be positive");
    }
    if !BORDER_STYLES.contains(&campaign.border_style.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Border style must be one of: {}",
            BORDER_STYLES.join(", ")
        )));
    }
    if let Some(target) = &campaign.target_url {
        if target.len() > 2048 {
            return bad("Target URL must be at most 2048 characters");
        }
        match url::Url::parse(target) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return bad("Target URL must be an absolute http(s) URL"),
        }
    }
    Ok(())
}
