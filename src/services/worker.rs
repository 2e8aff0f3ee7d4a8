use crate::config::AppConfig;
use crate::entities::{prelude::*, *};
use crate::services::notifications::NotificationService;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::sync::watch;
use tokio::time::{Duration, interval};

pub struct BackgroundWorker {
    db: DatabaseConnection,
    config: AppConfig,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(db: DatabaseConnection, config: AppConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            db,
            config,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Background worker started (every {}s)",
            self.config.notification_interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.config.notification_interval_secs));

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }

    pub async fn run_once(&self) {
        tracing::debug!("🧹 Running background tasks...");
        let now = Utc::now();

        // 1. Campaign notifications
        if let Err(e) =
            NotificationService::generate(&self.db, self.config.expiring_threshold_days, now).await
        {
            tracing::error!("Notification pass failed: {}", e);
        }

        // 2. Clean up expired tokens
        match Tokens::delete_many()
            .filter(tokens::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
        {
            Ok(res) if res.rows_affected > 0 => {
                tracing::info!("🔑 Removed {} expired token(s)", res.rows_affected)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Token cleanup failed: {}", e),
        }
    }
}
