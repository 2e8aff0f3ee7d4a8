#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use qr_campaign_backend::config::AppConfig;
use qr_campaign_backend::infrastructure::database;
use qr_campaign_backend::services::icons::LocalIconStorage;
use qr_campaign_backend::{AppState, create_app};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Keeps the icon directory alive for the duration of the test
    pub _icons: TempDir,
}

pub async fn setup_test_db() -> DatabaseConnection {
    // A single connection keeps every query on the same in-memory database
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

pub async fn setup() -> TestApp {
    let icons = tempfile::tempdir().unwrap();
    let config = AppConfig {
        jwt_secret: "test-secret".to_string(),
        upload_dir: icons.path().to_string_lossy().to_string(),
        public_base_url: "https://qr.example.com".to_string(),
        ..AppConfig::default()
    };

    let state = AppState {
        db: setup_test_db().await,
        icons: Arc::new(LocalIconStorage::new(icons.path())),
        config,
    };

    TestApp {
        router: create_app(state.clone()),
        state,
        _icons: icons,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn register(&self, username: &str) -> Value {
        let (status, body) = self
            .json(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    pub async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers the first account (which becomes admin) and logs it in.
    pub async fn admin_token(&self) -> String {
        self.register("admin").await;
        self.login("admin").await
    }

    pub async fn create_campaign(&self, token: &str, body: Value) -> Value {
        let (status, campaign) = self.json("POST", "/campaigns", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", campaign);
        campaign
    }

    pub async fn scan(&self, id: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder().uri(format!("/scan/{}", id));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

/// A campaign that started an hour ago and runs for `days` more days.
pub fn campaign_body(name: &str, days: i64) -> Value {
    let now = chrono::Utc::now();
    json!({
        "name": name,
        "category": "events",
        "start_date": (now - chrono::Duration::hours(1)).to_rfc3339(),
        "end_date": (now + chrono::Duration::days(days)).to_rfc3339(),
    })
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
