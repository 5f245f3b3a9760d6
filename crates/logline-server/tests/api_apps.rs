use axum::body::Body;
use axum::http::{Request, StatusCode};
use logline_db::{create_pool, DbRuntimeSettings};
use logline_server::{app, AppState};
use serde_json::Value;
use tower::ServiceExt; // for oneshot

/// Builds a router over a fresh migrated database. The TempDir must stay
/// alive for the duration of the test.
fn test_app() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("logline.db");

    let pool = create_pool(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("pool creation should succeed");
    let conn = pool.get().expect("should get a connection");
    logline_db::run_migrations(&conn).expect("migrations should succeed");
    drop(conn);

    (app(AppState { pool }), dir)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request should complete");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let json = serde_json::from_slice(&bytes).expect("body should be JSON");
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (app, _dir) = test_app();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn register_returns_created_with_credential() {
    let (app, _dir) = test_app();

    let (status, json) = send(&app, post("/apps/svc-a")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], 1);
    assert_eq!(json["name"], "svc-a");
    assert!(json["created_at"].is_string());

    let credential = json["ingest_credential"]
        .as_str()
        .expect("credential should be a string");
    assert_eq!(credential.len(), 32);
    assert!(credential.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn register_duplicate_name_is_conflict() {
    let (app, _dir) = test_app();

    let (status, _) = send(&app, post("/apps/svc-a")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(&app, post("/apps/svc-a")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "CONFLICT");
    assert_eq!(json["message"], "application with this name already exists");
}

#[tokio::test]
async fn get_application_excludes_credential() {
    let (app, _dir) = test_app();

    send(&app, post("/apps/svc-a")).await;

    let (status, json) = send(&app, get("/apps/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], 1);
    assert_eq!(json["name"], "svc-a");
    assert!(json["created_at"].is_string());
    assert!(
        json.get("ingest_credential").is_none(),
        "credential must not appear in reads: {json}"
    );
}

#[tokio::test]
async fn get_unknown_application_is_not_found() {
    let (app, _dir) = test_app();

    let (status, json) = send(&app, get("/apps/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "NOT_FOUND");
}

#[tokio::test]
async fn get_application_rejects_non_positive_ids() {
    let (app, _dir) = test_app();

    for uri in ["/apps/0", "/apps/-1", "/apps/abc"] {
        let (status, json) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} should be rejected");
        assert_eq!(json["error"], "VALIDATION_FAILED");
    }
}

#[tokio::test]
async fn list_applications_returns_insertion_order_without_credentials() {
    let (app, _dir) = test_app();

    for name in ["svc-a", "svc-b", "svc-c"] {
        let (status, _) = send(&app, post(&format!("/apps/{name}"))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(&app, get("/apps")).await;
    assert_eq!(status, StatusCode::OK);

    let items = json.as_array().expect("response should be an array");
    let names: Vec<&str> = items
        .iter()
        .map(|a| a["name"].as_str().expect("name should be a string"))
        .collect();
    assert_eq!(names, vec!["svc-a", "svc-b", "svc-c"]);
    assert!(items.iter().all(|a| a.get("ingest_credential").is_none()));
}
