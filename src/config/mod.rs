use std::env;

/// Application configuration for the campaign backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Lifetime of issued tokens in hours (default: 24)
    pub token_ttl_hours: i64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    /// Public base URL encoded into QR payloads (default: "http://localhost:3000")
    pub public_base_url: String,

    /// Directory where campaign icons are stored (default: "./uploads")
    pub upload_dir: String,

    /// Maximum icon size in bytes (default: 2 MB)
    pub max_icon_size: usize,

    /// Campaigns ending within this many days trigger a notification (default: 3)
    pub expiring_threshold_days: i64,

    /// Interval between notification passes in seconds (default: 300)
    pub notification_interval_secs: u64,

    /// Bootstrap admin account created at startup if missing
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            token_ttl_hours: 24,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            public_base_url: "http://localhost:3000".to_string(),
            upload_dir: "./uploads".to_string(),
            max_icon_size: 2 * 1024 * 1024, // 2 MB
            expiring_threshold_days: 3,
            notification_interval_secs: 300,
            admin_username: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(default.token_ttl_hours),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.public_base_url),

            upload_dir: env::var("UPLOAD_DIR").unwrap_or(default.upload_dir),

            max_icon_size: env::var("MAX_ICON_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_icon_size),

            expiring_threshold_days: env::var("EXPIRING_THRESHOLD_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.expiring_threshold_days),

            notification_interval_secs: env::var("NOTIFICATION_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.notification_interval_secs),

            admin_username: env::var("ADMIN_USERNAME").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Pick the profile named by `APP_ENV` (`production` or `development`), else plain env
    pub fn load() -> anyhow::Result<Self> {
        match env::var("APP_ENV").as_deref() {
            Ok("production") => Self::production(),
            Ok("development") => Ok(Self::development()),
            _ => {
                if env::var("JWT_SECRET").is_err() {
                    tracing::warn!(
                        "⚠️  JWT_SECRET is not set, using the insecure default (set APP_ENV=production to require it)"
                    );
                }
                Ok(Self::from_env())
            }
        }
    }

    /// Create config for development (local origins, frequent notification passes)
    pub fn development() -> Self {
        Self {
            notification_interval_secs: 60,
            ..Self::default()
        }
    }

    /// Create config for production (secret must come from the environment)
    pub fn production() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("CRITICAL: JWT_SECRET must be set"))?;

        let base = Self::from_env();
        Ok(Self {
            jwt_secret,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec![base.public_base_url.clone()]),
            ..base
        })
    }
}
