use crate::api::error::AppError;
use crate::services::scans::{ScanContext, ScanOutcome, ScanService};
use crate::utils::html::render_page;
use crate::utils::region::{client_ip, derive_region};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::SocketAddr;
use tracing::debug;

/// Inline styles are the only thing scan pages load.
const SCAN_PAGE_CSP: &str = "default-src 'none'; style-src 'unsafe-inline'; frame-ancestors 'none';";

#[utoipa::path(
    get,
    path = "/scan/{id}",
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 302, description = "Scan recorded, redirecting to the campaign target"),
        (status = 200, description = "Scan recorded, thank-you page", content_type = "text/html"),
        (status = 403, description = "Campaign has not started", content_type = "text/html"),
        (status = 404, description = "Campaign not found", content_type = "text/html"),
        (status = 410, description = "Campaign expired or scan limit reached", content_type = "text/html")
    ),
    tag = "scan"
)]
pub async fn scan_campaign(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let ctx = ScanContext {
        region: derive_region(&headers, ip),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: ip.map(|ip| ip.to_string()),
    };

    let outcome = ScanService::record_scan(&state.db, &id, ctx, Utc::now()).await?;

    let response = match outcome {
        ScanOutcome::Recorded { campaign, .. } => match campaign.target_url {
            Some(target) => match HeaderValue::from_str(&target) {
                Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
                Err(_) => {
                    debug!("Campaign {} has an unusable target URL", campaign.id);
                    page(
                        StatusCode::OK,
                        "Thanks for scanning",
                        &campaign.name,
                        "Your scan has been recorded.",
                    )
                }
            },
            None => page(
                StatusCode::OK,
                "Thanks for scanning",
                &campaign.name,
                "Your scan has been recorded.",
            ),
        },
        ScanOutcome::NotStarted(campaign) => page(
            StatusCode::FORBIDDEN,
            "Campaign not started",
            &campaign.name,
            &format!(
                "This campaign starts on {}. Please come back later.",
                campaign.start_date.format("%Y-%m-%d %H:%M UTC")
            ),
        ),
        ScanOutcome::Expired(campaign) => page(
            StatusCode::GONE,
            "Campaign expired",
            &campaign.name,
            "This campaign has ended.",
        ),
        ScanOutcome::LimitReached(campaign) => page(
            StatusCode::GONE,
            "Campaign unavailable",
            &campaign.name,
            "This campaign has reached its scan limit.",
        ),
        ScanOutcome::NotFound => page(
            StatusCode::NOT_FOUND,
            "Campaign not found",
            "Campaign not found",
            "This QR code does not belong to any campaign.",
        ),
    };

    Ok(no_store(response))
}

fn page(status: StatusCode, title: &str, heading: &str, message: &str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CONTENT_SECURITY_POLICY, SCAN_PAGE_CSP),
        ],
        render_page(title, heading, message),
    )
        .into_response()
}

fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
