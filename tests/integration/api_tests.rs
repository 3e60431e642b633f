//! API integration tests, driven through the router without a socket

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_server::{
    api::create_router,
    config::AppConfig,
    models::{Role, User, UserClaims},
    repository::MemoryStore,
    services::{clock::SystemClock, Services},
    AppState,
};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    secret: String,
}

fn app() -> TestApp {
    let config = AppConfig::default();
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(store.clone(), Arc::new(SystemClock), config.lending.clone());
    let secret = config.auth.jwt_secret.clone();
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    TestApp {
        router: create_router(state),
        store,
        secret,
    }
}

impl TestApp {
    fn token(&self, user: &User) -> String {
        let now = chrono::Utc::now().timestamp();
        UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + 3600,
            iat: now,
        }
        .create_token(&self.secret)
        .unwrap()
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = app();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/borrows",
            None,
            Some(json!({ "book_id": 1, "days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn test_reader_borrows_for_self() {
    let app = app();
    let book = app.store.insert_book("Neuromancer", 1).await;
    let reader = app.store.insert_user("alice", Role::Reader).await;
    let token = app.token(&reader);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/borrows",
            Some(&token),
            Some(json!({ "book_id": book.id, "days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], reader.id);
    assert_eq!(body["status"], "unreturned");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/borrows",
            Some(&token),
            Some(json!({ "book_id": book.id, "days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateBorrow");
}

#[tokio::test]
async fn test_reader_cannot_borrow_for_someone_else() {
    let app = app();
    let book = app.store.insert_book("Neuromancer", 1).await;
    let reader = app.store.insert_user("alice", Role::Reader).await;
    let other = app.store.insert_user("bob", Role::Reader).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/borrows",
            Some(&app.token(&reader)),
            Some(json!({ "user_id": other.id, "book_id": book.id, "days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_out_of_range_duration_is_bad_request() {
    let app = app();
    let book = app.store.insert_book("Neuromancer", 1).await;
    let reader = app.store.insert_user("alice", Role::Reader).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/borrows",
            Some(&app.token(&reader)),
            Some(json!({ "book_id": book.id, "days": 91 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5);
}

#[tokio::test]
async fn test_sweeps_are_admin_only() {
    let app = app();
    let reader = app.store.insert_user("alice", Role::Reader).await;
    let admin = app.store.insert_user("root", Role::Admin).await;

    let (status, _) = app
        .send(Method::POST, "/api/v1/sweeps/overdue", Some(&app.token(&reader)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/api/v1/sweeps/overdue", Some(&app.token(&admin)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], json!([]));
}

#[tokio::test]
async fn test_frozen_account_is_unprocessable() {
    let app = app();
    let book = app.store.insert_book("Neuromancer", 1).await;
    let reader = app.store.insert_user("alice", Role::Reader).await;
    let admin = app.store.insert_user("root", Role::Admin).await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/users/{}/status", reader.id),
            Some(&app.token(&admin)),
            Some(json!({ "status": "frozen" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "frozen");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/borrows",
            Some(&app.token(&reader)),
            Some(json!({ "book_id": book.id, "days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "AccountFrozen");
}

#[tokio::test]
async fn test_reservation_lifecycle_over_http() {
    let app = app();
    let book = app.store.insert_book("Hyperion", 1).await;
    let reader = app.store.insert_user("alice", Role::Reader).await;
    let admin = app.store.insert_user("root", Role::Admin).await;
    let reader_token = app.token(&reader);
    let admin_token = app.token(&admin);

    let (status, hold) = app
        .send(
            Method::POST,
            "/api/v1/reservations",
            Some(&reader_token),
            Some(json!({ "book_id": book.id, "days": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let hold_id = hold["id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/reservations/{}/confirm", hold_id),
            Some(&reader_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/reservations/{}/confirm", hold_id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, queue) = app
        .send(
            Method::GET,
            &format!("/api/v1/books/{}/reservations?status=reserved", book.id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/reservations/{}/cancel", hold_id),
            Some(&reader_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/reservations/{}/cancel", hold_id),
            Some(&reader_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyCancelled");
}

#[tokio::test]
async fn test_stock_adjustment_rejects_lent_copies() {
    let app = app();
    let book = app.store.insert_book("Hyperion", 1).await;
    let reader = app.store.insert_user("alice", Role::Reader).await;
    let admin = app.store.insert_user("root", Role::Admin).await;

    app.send(
        Method::POST,
        "/api/v1/borrows",
        Some(&app.token(&reader)),
        Some(json!({ "book_id": book.id, "days": 14 })),
    )
    .await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{}/stock", book.id),
            Some(&app.token(&admin)),
            Some(json!({ "delta": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InsufficientStock");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{}/stock", book.id),
            Some(&app.token(&admin)),
            Some(json!({ "delta": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_stock"], 3);
    assert_eq!(body["available_stock"], 2);
}
