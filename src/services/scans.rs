use crate::api::error::AppError;
use crate::entities::campaigns::CampaignStatus;
use crate::entities::{prelude::*, *};
use crate::services::campaigns::{CampaignService, limit_reached};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Request-derived facts recorded with every scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub region: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Recorded {
        campaign: campaigns::Model,
        event: scan_events::Model,
    },
    NotFound,
    NotStarted(campaigns::Model),
    Expired(campaigns::Model),
    LimitReached(campaigns::Model),
}

const MAX_USER_AGENT_LEN: usize = 512;

pub struct ScanService;

impl ScanService {
    /// Counts a scan and appends its event, never letting `scan_count` pass `scan_limit`.
    ///
    /// The increment is a single conditional UPDATE; when it matches no row the
    /// campaign was exhausted or expired by a concurrent scan and nothing is recorded.
    pub async fn record_scan<C: TransactionTrait>(
        db: &C,
        campaign_id: &str,
        ctx: ScanContext,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, AppError> {
        let txn = db.begin().await?;

        let Some(campaign) = Campaigns::find_by_id(campaign_id).one(&txn).await? else {
            return Ok(ScanOutcome::NotFound);
        };

        if campaign.start_date > now {
            return Ok(ScanOutcome::NotStarted(campaign));
        }

        let campaign = CampaignService::refresh_status(&txn, campaign, now).await?;
        if campaign.status == CampaignStatus::Expired {
            txn.commit().await?;
            return Ok(Self::rejection(campaign));
        }

        let result = Campaigns::update_many()
            .col_expr(
                campaigns::Column::ScanCount,
                Expr::col(campaigns::Column::ScanCount).add(1),
            )
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
            .filter(campaigns::Column::Id.eq(campaign_id))
            .filter(campaigns::Column::Status.eq(CampaignStatus::Active))
            .filter(campaigns::Column::EndDate.gt(now))
            .filter(
                Condition::any()
                    .add(campaigns::Column::ScanLimit.is_null())
                    .add(
                        Expr::col(campaigns::Column::ScanCount)
                            .lt(Expr::col(campaigns::Column::ScanLimit)),
                    ),
            )
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            debug!("Scan for campaign {} lost the increment race", campaign_id);
            let current = CampaignService::find(&txn, campaign_id).await?;
            let current = CampaignService::refresh_status(&txn, current, now).await?;
            txn.commit().await?;
            return Ok(Self::rejection(current));
        }

        let user_agent = ctx
            .user_agent
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect::<String>());

        let event = scan_events::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            campaign_id: Set(campaign_id.to_string()),
            region: Set(ctx.region),
            scanned_at: Set(now),
            user_agent: Set(user_agent),
            ip_address: Set(ctx.ip_address),
        }
        .insert(&txn)
        .await?;

        // The scan that consumes the last slot also flips the campaign to expired
        let updated = CampaignService::find(&txn, campaign_id).await?;
        let updated = CampaignService::refresh_status(&txn, updated, now).await?;

        txn.commit().await?;

        info!(
            target: "scans",
            campaign_id = %campaign_id,
            region = %event.region,
            scan_count = updated.scan_count,
            "scan_recorded"
        );

        Ok(ScanOutcome::Recorded {
            campaign: updated,
            event,
        })
    }

    fn rejection(campaign: campaigns::Model) -> ScanOutcome {
        if limit_reached(campaign.scan_count, campaign.scan_limit) {
            ScanOutcome::LimitReached(campaign)
        } else {
            ScanOutcome::Expired(campaign)
        }
    }
}
