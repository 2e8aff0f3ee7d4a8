use crate::config::AppConfig;
use crate::services::users::UserService;
use sea_orm::DatabaseConnection;
use tracing::info;

/// Creates the bootstrap admin account when one is configured and missing.
pub async fn seed_admin(db: &DatabaseConnection, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    if UserService::find_by_username(db, username).await?.is_some() {
        info!("🌱 Bootstrap admin '{}' already present", username);
        return Ok(());
    }

    UserService::create_user(db, username, password, true).await?;
    info!("🌱 Bootstrap admin '{}' created", username);
    Ok(())
}
