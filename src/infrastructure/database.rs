use crate::config::AppConfig;
use crate::entities::{campaigns, notifications, scan_events, tokens, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    info!("📂 Database: {}", redact_url(&db_url));

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(50)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    crate::infrastructure::seed::seed_admin(&db, config).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: Users -> Tokens/Campaigns -> ScanEvents/Notifications
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "tokens",
            schema
                .create_table_from_entity(tokens::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "campaigns",
            schema
                .create_table_from_entity(campaigns::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "scan_events",
            schema
                .create_table_from_entity(scan_events::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "notifications",
            schema
                .create_table_from_entity(notifications::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
        info!("   - Table '{}' checked/created", name);
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON tokens(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status)",
        "CREATE INDEX IF NOT EXISTS idx_campaigns_end_date ON campaigns(end_date)",
        "CREATE INDEX IF NOT EXISTS idx_campaigns_category ON campaigns(category)",
        "CREATE INDEX IF NOT EXISTS idx_scan_events_campaign_id ON scan_events(campaign_id)",
        "CREATE INDEX IF NOT EXISTS idx_scan_events_scanned_at ON scan_events(scanned_at)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id)",
        // One notification per (campaign, admin, type)
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_dedup ON notifications(campaign_id, user_id, notification_type)",
    ];

    for query in indexes {
        match db
            .execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
        {
            Ok(_) => tracing::debug!("   - Executed schema update: {}", query),
            Err(e) => tracing::warn!("   - Schema update warning: {} -> {}", query, e),
        }
    }

    Ok(())
}

/// Strips credentials from a connection string before it is logged.
fn redact_url(db_url: &str) -> String {
    match url::Url::parse(db_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => db_url.to_string(),
    }
}
