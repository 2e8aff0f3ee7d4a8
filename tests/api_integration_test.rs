mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{PASSWORD, setup};
use qr_campaign_backend::entities::{prelude::*, users};
use qr_campaign_backend::services::users::UserService;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;
    let (status, body) = app.json("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_first_user_becomes_admin() {
    let app = setup().await;

    let first = app.register("alice").await;
    let second = app.register("bob").await;

    assert_eq!(first["is_admin"], true);
    assert_eq!(second["is_admin"], false);
    assert!(first.get("password_hash").is_none());
}

#[tokio::test]
async fn test_concurrent_first_registrations_yield_one_admin() {
    let app = setup().await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let db = app.state.db.clone();
        handles.push(tokio::spawn(async move {
            UserService::register(&db, &format!("racer{}", i), PASSWORD).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(Users::find().count(&app.state.db).await.unwrap(), 4);
    let admins = Users::find()
        .filter(users::Column::IsAdmin.eq(true))
        .count(&app.state.db)
        .await
        .unwrap();
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_short_passwords() {
    let app = setup().await;
    app.register("alice").await;

    let (status, body) = app
        .json(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = app
        .json(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "carol", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_me_and_logout() {
    let app = setup().await;
    app.register("alice").await;

    let (status, _) = app
        .json(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login("alice").await;

    let (status, me) = app.json("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    let (status, _) = app.json("POST", "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The revoked token no longer authenticates
    let (status, _) = app.json("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_accepted_from_query() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (status, me) = app
        .json("GET", &format!("/auth/me?token={}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
}

#[tokio::test]
async fn test_missing_or_forged_token_rejected() {
    let app = setup().await;

    let (status, _) = app.json("GET", "/campaigns", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json("GET", "/campaigns", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_forbidden_for_regular_users() {
    let app = setup().await;
    app.register("admin").await;
    app.register("viewer").await;
    let token = app.login("viewer").await;

    let (status, _) = app.json("GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("GET", "/analytics/overview", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            "POST",
            "/campaigns",
            Some(&token),
            Some(common::campaign_body("Nope", 5)),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reading campaigns only needs a login
    let (status, _) = app.json("GET", "/campaigns", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (status, created) = app
        .json(
            "POST",
            "/users",
            Some(&token),
            Some(json!({ "username": "editor", "password": PASSWORD, "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_admin"], true);
    let editor_id = created["id"].as_str().unwrap().to_string();

    let (status, users) = app.json("GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let editor_token = app.login("editor").await;

    let (status, updated) = app
        .json(
            "PUT",
            &format!("/users/{}/active", editor_id),
            Some(&token),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);

    // Deactivation revokes existing sessions and blocks new logins
    let (status, _) = app.json("GET", "/auth/me", Some(&editor_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .json(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "editor", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            "PUT",
            &format!("/users/{}/active", editor_id),
            Some(&token),
            Some(json!({ "is_active": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.login("editor").await;
}

#[tokio::test]
async fn test_last_admin_cannot_be_removed() {
    let app = setup().await;
    let admin = app.register("admin").await;
    let token = app.login("admin").await;
    let admin_id = admin["id"].as_str().unwrap();

    let (status, _) = app
        .json(
            "PUT",
            &format!("/users/{}/admin", admin_id),
            Some(&token),
            Some(json!({ "is_admin": false })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            "PUT",
            &format!("/users/{}/active", admin_id),
            Some(&token),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            "PUT",
            "/users/does-not-exist/admin",
            Some(&token),
            Some(json!({ "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = setup().await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));

    let response = app
        .send(
            Request::builder()
                .method("TRACE")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = setup().await;
    let (status, doc) = app.json("GET", "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/scan/{id}"].is_object());
    assert!(doc["paths"]["/campaigns/{id}/analytics"].is_object());
}
