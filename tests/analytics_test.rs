mod common;

use axum::http::StatusCode;
use chrono::{Duration, Timelike, Utc};
use common::{campaign_body, setup};
use qr_campaign_backend::entities::{prelude::*, users};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

#[tokio::test]
async fn test_overview_counts() {
    let app = setup().await;
    let token = app.admin_token().await;
    app.register("viewer").await;

    let mut limited = campaign_body("Limited", 10);
    limited["scan_limit"] = json!(1);
    let limited = app.create_campaign(&token, limited).await;
    let open = app.create_campaign(&token, campaign_body("Open", 10)).await;

    app.scan(limited["id"].as_str().unwrap(), &[]).await;
    app.scan(open["id"].as_str().unwrap(), &[]).await;
    app.scan(open["id"].as_str().unwrap(), &[]).await;

    let (status, overview) = app
        .json("GET", "/analytics/overview", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["total_campaigns"], 2);
    assert_eq!(overview["active_campaigns"], 1);
    assert_eq!(overview["expired_campaigns"], 1);
    assert_eq!(overview["total_scans"], 3);
    assert_eq!(overview["scans_today"], 3);
    assert_eq!(overview["total_users"], 2);
    assert_eq!(overview["active_users"], 2);
}

#[tokio::test]
async fn test_hourly_and_daily_buckets() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Hours", 10)).await;
    let id = created["id"].as_str().unwrap();
    app.scan(id, &[]).await;
    app.scan(id, &[]).await;

    let (status, hourly) = app
        .json("GET", "/analytics/hourly", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let hourly = hourly.as_array().unwrap();
    assert_eq!(hourly.len(), 24);
    let total: u64 = hourly.iter().map(|b| b["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 2);

    let hour = Utc::now().hour() as usize;
    // The scans may straddle an hour boundary
    let recent = hourly[hour]["count"].as_u64().unwrap()
        + hourly[(hour + 23) % 24]["count"].as_u64().unwrap();
    assert_eq!(recent, 2);

    let (status, daily) = app
        .json("GET", "/analytics/daily?days=7", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let daily = daily.as_array().unwrap();
    assert_eq!(daily.len(), 7);
    assert_eq!(
        daily.last().unwrap()["date"],
        Utc::now().date_naive().to_string()
    );
    let total: u64 = daily.iter().map(|b| b["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 2);

    // Out-of-range windows are clamped
    let (_, clamped) = app
        .json("GET", "/analytics/daily?days=1000", Some(&token), None)
        .await;
    assert_eq!(clamped.as_array().unwrap().len(), 365);
    let (_, clamped) = app
        .json("GET", "/analytics/daily?days=0", Some(&token), None)
        .await;
    assert_eq!(clamped.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_top_campaigns_ordering() {
    let app = setup().await;
    let token = app.admin_token().await;

    let quiet = app.create_campaign(&token, campaign_body("Quiet", 10)).await;
    let busy = app.create_campaign(&token, campaign_body("Busy", 10)).await;
    app.create_campaign(&token, campaign_body("Idle", 10)).await;

    for _ in 0..3 {
        app.scan(busy["id"].as_str().unwrap(), &[]).await;
    }
    app.scan(quiet["id"].as_str().unwrap(), &[]).await;

    let (status, top) = app
        .json("GET", "/analytics/top-campaigns?limit=2", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let top = top.as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["name"], "Busy");
    assert_eq!(top[0]["scan_count"], 3);
    assert_eq!(top[1]["name"], "Quiet");
}

#[tokio::test]
async fn test_user_growth_is_cumulative() {
    let app = setup().await;
    let token = app.admin_token().await;
    app.register("second").await;

    // One account that predates the window
    users::ActiveModel {
        id: Set("old-user".to_string()),
        username: Set("veteran".to_string()),
        password_hash: Set("unused".to_string()),
        is_active: Set(true),
        is_admin: Set(false),
        created_at: Set(Utc::now() - Duration::days(60)),
    }
    .insert(&app.state.db)
    .await
    .unwrap();

    let (status, growth) = app
        .json("GET", "/analytics/user-growth?days=7", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let growth = growth.as_array().unwrap();
    assert_eq!(growth.len(), 7);
    assert_eq!(growth[0]["total_users"], 1);

    let today = growth.last().unwrap();
    assert_eq!(today["new_users"], 2);
    assert_eq!(today["total_users"], 3);
    assert_eq!(Users::find().all(&app.state.db).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_campaign_analytics_summary() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Summary", 10)).await;
    let other = app.create_campaign(&token, campaign_body("Other", 10)).await;
    let id = created["id"].as_str().unwrap();

    app.scan(id, &[("cf-ipcountry", "FR")]).await;
    app.scan(id, &[("cf-ipcountry", "FR")]).await;
    app.scan(other["id"].as_str().unwrap(), &[("cf-ipcountry", "US")])
        .await;

    let (status, summary) = app
        .json(
            "GET",
            &format!("/campaigns/{}/analytics?days=14", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["campaign_id"], id);
    assert_eq!(summary["scan_count"], 2);
    assert_eq!(summary["regions"], json!([{ "region": "FR", "count": 2 }]));
    assert_eq!(summary["hourly"].as_array().unwrap().len(), 24);
    assert_eq!(summary["daily"].as_array().unwrap().len(), 14);
    assert_eq!(summary["recent_scans"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .json("GET", "/campaigns/missing/analytics", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_query_is_json_bad_request() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .json("GET", "/analytics/daily?days=abc", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .json("GET", "/analytics/top-campaigns?limit=-", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
