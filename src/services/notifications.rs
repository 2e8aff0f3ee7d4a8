use crate::api::error::AppError;
use crate::entities::campaigns::CampaignStatus;
use crate::entities::notifications::NotificationType;
use crate::entities::{prelude::*, *};
use crate::services::campaigns::{CampaignService, limit_reached};
use crate::services::users::UserService;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Which alerts a campaign currently warrants at `now`.
pub fn pending_types(
    campaign: &campaigns::Model,
    now: DateTime<Utc>,
    expiring_threshold: Duration,
) -> Vec<NotificationType> {
    let mut types = Vec::new();

    if campaign.status == CampaignStatus::Active
        && campaign.end_date > now
        && campaign.end_date - now <= expiring_threshold
    {
        types.push(NotificationType::ExpiringCampaign);
    }
    if limit_reached(campaign.scan_count, campaign.scan_limit) {
        types.push(NotificationType::ScanLimitReached);
    }

    types
}

fn compose(campaign: &campaigns::Model, kind: NotificationType, now: DateTime<Utc>) -> (String, String) {
    match kind {
        NotificationType::ExpiringCampaign => {
            let hours = (campaign.end_date - now).num_hours().max(0);
            let remaining = if hours >= 24 {
                format!("{} day(s)", hours / 24)
            } else {
                format!("{} hour(s)", hours)
            };
            (
                "Campaign expiring soon".to_string(),
                format!(
                    "Campaign \"{}\" ends in {} ({}).",
                    campaign.name,
                    remaining,
                    campaign.end_date.format("%Y-%m-%d %H:%M UTC")
                ),
            )
        }
        NotificationType::ScanLimitReached => (
            "Scan limit reached".to_string(),
            format!(
                "Campaign \"{}\" reached its scan limit of {}.",
                campaign.name,
                campaign.scan_limit.unwrap_or(campaign.scan_count)
            ),
        ),
    }
}

pub struct NotificationService;

impl NotificationService {
    /// One pass of the generator. Returns the number of notifications created.
    ///
    /// Idempotent: a (campaign, admin, type) triple is notified at most once.
    pub async fn generate<C: ConnectionTrait>(
        db: &C,
        expiring_threshold_days: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        CampaignService::expire_due(db, now).await?;

        let admins = UserService::active_admins(db).await?;
        if admins.is_empty() {
            debug!("No active administrators to notify");
            return Ok(0);
        }

        let threshold = Duration::days(expiring_threshold_days.max(0));
        let campaigns = Campaigns::find().all(db).await?;
        let mut created = 0u64;

        for campaign in &campaigns {
            for kind in pending_types(campaign, now, threshold) {
                for admin in &admins {
                    if Self::exists(db, &campaign.id, &admin.id, kind).await? {
                        continue;
                    }
                    let (title, message) = compose(campaign, kind, now);
                    let model = notifications::ActiveModel {
                        id: Set(Uuid::new_v4().to_string()),
                        notification_type: Set(kind),
                        title: Set(title),
                        message: Set(message),
                        campaign_id: Set(campaign.id.clone()),
                        user_id: Set(admin.id.clone()),
                        is_read: Set(false),
                        created_at: Set(now),
                    };

                    // The unique index makes a concurrent duplicate a no-op
                    let inserted = Notifications::insert(model)
                        .on_conflict(
                            OnConflict::columns([
                                notifications::Column::CampaignId,
                                notifications::Column::UserId,
                                notifications::Column::NotificationType,
                            ])
                            .do_nothing()
                            .to_owned(),
                        )
                        .exec_without_returning(db)
                        .await?;
                    created += inserted;
                }
            }
        }

        if created > 0 {
            info!("🔔 Generated {} notification(s)", created);
        }
        Ok(created)
    }

    async fn exists<C: ConnectionTrait>(
        db: &C,
        campaign_id: &str,
        user_id: &str,
        kind: NotificationType,
    ) -> Result<bool, AppError> {
        let count = Notifications::find()
            .filter(notifications::Column::CampaignId.eq(campaign_id))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::NotificationType.eq(kind))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<notifications::Model>, AppError> {
        let mut query = Notifications::find().filter(notifications::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notifications::Column::IsRead.eq(false));
        }
        Ok(query
            .order_by_desc(notifications::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn unread_count<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64, AppError> {
        Ok(Notifications::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .count(db)
            .await?)
    }

    pub async fn mark_read<C: ConnectionTrait>(
        db: &C,
        id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let result = Notifications::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64, AppError> {
        let result = Notifications::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: &str, user_id: &str) -> Result<(), AppError> {
        let result = Notifications::delete_many()
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }
}
