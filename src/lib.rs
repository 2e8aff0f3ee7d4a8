pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::handlers;
use crate::api::middleware::auth::{auth_middleware, require_admin};
use crate::config::AppConfig;
use crate::services::icons::IconStorage;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::set_active,
        handlers::users::set_admin,
        handlers::campaigns::list_campaigns,
        handlers::campaigns::create_campaign,
        handlers::campaigns::list_categories,
        handlers::campaigns::get_campaign,
        handlers::campaigns::update_campaign,
        handlers::campaigns::delete_campaign,
        handlers::campaigns::upload_icon,
        handlers::campaigns::get_icon,
        handlers::campaigns::campaign_analytics,
        handlers::scan::scan_campaign,
        handlers::analytics::overview,
        handlers::analytics::regions,
        handlers::analytics::hourly,
        handlers::analytics::daily,
        handlers::analytics::top_campaigns,
        handlers::analytics::user_growth,
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::generate,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::delete_notification,
    ),
    components(
        schemas(
            handlers::health::HealthResponse,
            handlers::auth::AuthRequest,
            handlers::auth::AuthResponse,
            handlers::auth::UserResponse,
            handlers::users::CreateUserRequest,
            handlers::users::SetActiveRequest,
            handlers::users::SetAdminRequest,
            handlers::campaigns::CreateCampaignRequest,
            handlers::campaigns::UpdateCampaignRequest,
            handlers::campaigns::CampaignResponse,
            handlers::notifications::NotificationResponse,
            handlers::notifications::CountResponse,
            entities::campaigns::CampaignStatus,
            entities::notifications::NotificationType,
            services::analytics::Overview,
            services::analytics::RegionCount,
            services::analytics::HourBucket,
            services::analytics::DayBucket,
            services::analytics::UserGrowthPoint,
            services::analytics::TopCampaign,
            services::analytics::RecentScan,
            services::analytics::CampaignAnalytics,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User administration"),
        (name = "campaigns", description = "Campaign management"),
        (name = "scan", description = "Public QR scan endpoint"),
        (name = "analytics", description = "Scan and user analytics"),
        (name = "notifications", description = "Administrator notifications"),
        (name = "system", description = "Health and status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub icons: Arc<dyn IconStorage>,
}

/// Multipart framing on top of the icon itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/scan/:id", get(handlers::scan::scan_campaign))
        .route("/campaigns/:id/icon", get(handlers::campaigns::get_icon));

    let authenticated = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/campaigns", get(handlers::campaigns::list_campaigns))
        .route(
            "/campaigns/categories",
            get(handlers::campaigns::list_categories),
        )
        .route("/campaigns/:id", get(handlers::campaigns::get_campaign))
        .route(
            "/campaigns/:id/analytics",
            get(handlers::campaigns::campaign_analytics),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let admin = Router::new()
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route("/users/:id/active", put(handlers::users::set_active))
        .route("/users/:id/admin", put(handlers::users::set_admin))
        .route("/campaigns", post(handlers::campaigns::create_campaign))
        .route(
            "/campaigns/:id",
            put(handlers::campaigns::update_campaign).delete(handlers::campaigns::delete_campaign),
        )
        .route(
            "/campaigns/:id/icon",
            post(handlers::campaigns::upload_icon).layer(DefaultBodyLimit::max(
                state.config.max_icon_size + MULTIPART_OVERHEAD,
            )),
        )
        .route("/analytics/overview", get(handlers::analytics::overview))
        .route("/analytics/regions", get(handlers::analytics::regions))
        .route("/analytics/hourly", get(handlers::analytics::hourly))
        .route("/analytics/daily", get(handlers::analytics::daily))
        .route(
            "/analytics/top-campaigns",
            get(handlers::analytics::top_campaigns),
        )
        .route(
            "/analytics/user-growth",
            get(handlers::analytics::user_growth),
        )
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(handlers::notifications::unread_count),
        )
        .route(
            "/notifications/generate",
            post(handlers::notifications::generate),
        )
        .route(
            "/notifications/read-all",
            put(handlers::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            put(handlers::notifications::mark_read),
        )
        .route(
            "/notifications/:id",
            delete(handlers::notifications::delete_notification),
        )
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        // Swagger UI ships its own scripts, so it is merged after the strict CSP
        .layer(from_fn(api::middleware::security::security_headers))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    base.allow_origin(origins)
}
