mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{body_string, campaign_body, setup};
use http_body_util::BodyExt;
use qr_campaign_backend::entities::{campaigns, prelude::*};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

fn multipart_request(uri: &str, token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let boundary = "----qrcampaignboundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"icon\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_create_and_get_campaign() {
    let app = setup().await;
    let token = app.admin_token().await;

    let mut body = campaign_body("Spring Sale", 10);
    body["description"] = json!("Discounts on everything");
    body["scan_limit"] = json!(100);
    body["border_style"] = json!("rounded");
    body["target_url"] = json!("https://shop.example.com/spring");

    let created = app.create_campaign(&token, body).await;
    let id = created["id"].as_str().unwrap();

    assert_eq!(created["status"], "active");
    assert_eq!(created["scan_count"], 0);
    assert_eq!(created["scan_limit"], 100);
    assert_eq!(created["border_style"], "rounded");
    assert_eq!(
        created["qr_payload"],
        format!("https://qr.example.com/scan/{}", id)
    );
    assert!(created["icon_url"].is_null());

    let (status, fetched) = app
        .json("GET", &format!("/campaigns/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Spring Sale");
    assert_eq!(fetched["description"], "Discounts on everything");

    let (status, _) = app
        .json("GET", "/campaigns/unknown-id", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_campaign_validation() {
    let app = setup().await;
    let token = app.admin_token().await;
    let now = chrono::Utc::now();

    let mut reversed = campaign_body("Backwards", 5);
    reversed["end_date"] = json!((now - chrono::Duration::days(2)).to_rfc3339());
    let (status, _) = app.json("POST", "/campaigns", Some(&token), Some(reversed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut zero_limit = campaign_body("Zero", 5);
    zero_limit["scan_limit"] = json!(0);
    let (status, _) = app.json("POST", "/campaigns", Some(&token), Some(zero_limit)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_border = campaign_body("Border", 5);
    bad_border["border_style"] = json!("zigzag");
    let (status, _) = app.json("POST", "/campaigns", Some(&token), Some(bad_border)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_target = campaign_body("Target", 5);
    bad_target["target_url"] = json!("javascript:alert(1)");
    let (status, _) = app.json("POST", "/campaigns", Some(&token), Some(bad_target)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("POST", "/campaigns", Some(&token), Some(campaign_body("", 5)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters_and_categories() {
    let app = setup().await;
    let token = app.admin_token().await;

    app.create_campaign(&token, campaign_body("Summer Festival", 10))
        .await;
    let mut retail = campaign_body("Winter Sale", 10);
    retail["category"] = json!("retail");
    app.create_campaign(&token, retail).await;

    let (status, all) = app.json("GET", "/campaigns", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, retail_only) = app
        .json("GET", "/campaigns?category=retail", Some(&token), None)
        .await;
    let retail_only = retail_only.as_array().unwrap();
    assert_eq!(retail_only.len(), 1);
    assert_eq!(retail_only[0]["name"], "Winter Sale");

    let (_, searched) = app
        .json("GET", "/campaigns?search=Festival", Some(&token), None)
        .await;
    assert_eq!(searched.as_array().unwrap().len(), 1);

    let (_, expired) = app
        .json("GET", "/campaigns?status=expired", Some(&token), None)
        .await;
    assert!(expired.as_array().unwrap().is_empty());

    let (status, categories) = app
        .json("GET", "/campaigns/categories", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories, json!(["events", "retail"]));
}

#[tokio::test]
async fn test_unknown_status_filter_is_json_bad_request() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .json("GET", "/campaigns?status=bogus", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn test_partial_update_and_clearing_fields() {
    let app = setup().await;
    let token = app.admin_token().await;

    let mut body = campaign_body("Launch", 10);
    body["description"] = json!("Original");
    body["target_url"] = json!("https://example.com");
    let created = app.create_campaign(&token, body).await;
    let uri = format!("/campaigns/{}", created["id"].as_str().unwrap());

    let (status, updated) = app
        .json(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "name": "Launch v2", "description": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Launch v2");
    assert!(updated["description"].is_null());
    // Absent fields are untouched
    assert_eq!(updated["target_url"], "https://example.com");
    assert_eq!(updated["category"], "events");

    let (status, updated) = app
        .json("PUT", &uri, Some(&token), Some(json!({ "scan_limit": 3 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["scan_limit"], 3);

    let (status, _) = app
        .json("PUT", &uri, Some(&token), Some(json!({ "border_style": "wavy" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_enforces_create_length_limits() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Limits", 10)).await;
    let uri = format!("/campaigns/{}", created["id"].as_str().unwrap());

    let (status, body) = app
        .json(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "description": "x".repeat(5000) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Description"));

    let (status, _) = app
        .json(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "target_url": format!("https://e.com/{}", "a".repeat(5000)) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, fetched) = app.json("GET", &uri, Some(&token), None).await;
    assert!(fetched["description"].is_null());
    assert!(fetched["target_url"].is_null());
}

#[tokio::test]
async fn test_reads_never_reactivate_expired_campaign() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Closed", 10)).await;
    let id = created["id"].as_str().unwrap();

    // Dates and limit still allow scanning, but the row is stored as expired
    let stored = Campaigns::find_by_id(id).one(&app.state.db).await.unwrap().unwrap();
    let mut model: campaigns::ActiveModel = stored.into();
    model.status = Set(campaigns::CampaignStatus::Expired);
    model.update(&app.state.db).await.unwrap();

    let (status, fetched) = app
        .json("GET", &format!("/campaigns/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "expired");

    let stored = Campaigns::find_by_id(id).one(&app.state.db).await.unwrap().unwrap();
    assert_eq!(stored.status, campaigns::CampaignStatus::Expired);
}

#[tokio::test]
async fn test_scan_limit_cannot_drop_below_count() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Promo", 10)).await;
    let id = created["id"].as_str().unwrap();
    for _ in 0..3 {
        let response = app.scan(id, &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let uri = format!("/campaigns/{}", id);
    let (status, _) = app
        .json("PUT", &uri, Some(&token), Some(json!({ "scan_limit": 2 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Setting the limit exactly at the count exhausts the campaign
    let (status, updated) = app
        .json("PUT", &uri, Some(&token), Some(json!({ "scan_limit": 3 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "expired");

    // Lifting the limit reactivates it
    let (status, updated) = app
        .json("PUT", &uri, Some(&token), Some(json!({ "scan_limit": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "active");
}

#[tokio::test]
async fn test_delete_campaign_removes_history() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Gone", 10)).await;
    let id = created["id"].as_str().unwrap();
    app.scan(id, &[]).await;

    let uri = format!("/campaigns/{}", id);
    let (status, _) = app.json("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, overview) = app
        .json("GET", "/analytics/overview", Some(&token), None)
        .await;
    assert_eq!(overview["total_scans"], 0);

    let (status, _) = app.json("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_icon_upload_and_download() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Icons", 10)).await;
    let id = created["id"].as_str().unwrap();
    let icon_uri = format!("/campaigns/{}/icon", id);

    // Not uploaded yet
    let response = app
        .send(Request::builder().uri(&icon_uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut png = PNG_HEADER.to_vec();
    png.extend_from_slice(&[0u8; 64]);

    let response = app
        .send(multipart_request(&icon_uri, &token, "logo.png", &png))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(updated["icon_url"], icon_uri);

    // Served publicly without a token
    let response = app
        .send(Request::builder().uri(&icon_uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_icon_upload_rejects_non_images() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app.create_campaign(&token, campaign_body("Icons", 10)).await;
    let icon_uri = format!("/campaigns/{}/icon", created["id"].as_str().unwrap());

    let response = app
        .send(multipart_request(
            &icon_uri,
            &token,
            "script.png",
            b"#!/bin/sh\necho not an image\n",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(multipart_request(
            "/campaigns/missing/icon",
            &token,
            "logo.png",
            PNG_HEADER,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
