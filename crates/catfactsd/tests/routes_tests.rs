//! HTTP command surface, exercised in-process.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use catfacts_common::{Fact, FactStore, ScriptedFactSource, SqliteFactStore};
use catfactsd::server::{router, AppState};
use catfactsd::service::FactCatalogService;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: Arc<SqliteFactStore>,
    export_dir: TempDir,
}

fn test_app(script: Vec<Option<&str>>) -> TestApp {
    let store = Arc::new(SqliteFactStore::open_in_memory().unwrap());
    let export_dir = tempfile::tempdir().unwrap();
    let service = FactCatalogService::new(
        store.clone(),
        Arc::new(ScriptedFactSource::new(script)),
        export_dir.path().to_path_buf(),
    );
    TestApp {
        app: router(AppState::new(service, 10)),
        store,
        export_dir,
    }
}

fn seed(store: &SqliteFactStore, text: &str) -> Fact {
    store.add(&Fact::fetched(text, text.len() as i64)).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_home_summary_route() {
    let t = test_app(vec![]);
    let fact = seed(&t.store, "Cats have 32 muscles in each ear.");
    t.store.toggle_favorite(fact.id).unwrap();
    t.store.rate(fact.id, 5).unwrap();

    let (status, body) = send_json(&t.app, Method::GET, "/v1/home", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["average_rating"], 5.0);
    assert_eq!(body["recent_facts"][0]["text"], "Cats have 32 muscles in each ear.");
    assert_eq!(body["recent_facts"][0]["time_ago"], "just now");
    assert_eq!(body["favorite_facts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_one_route() {
    let t = test_app(vec![Some("Cats sleep a lot."), Some("cats sleep a lot.")]);

    let (status, body) = send_json(&t.app, Method::POST, "/v1/facts/fetch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["fact"]["category"], "behavior");

    let (_, body) = send_json(&t.app, Method::POST, "/v1/facts/fetch", None).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
    assert_eq!(t.store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_fetch_many_route_validates_count() {
    let t = test_app(vec![Some("One."), Some("Two.")]);

    for bad in [0, 11, -3] {
        let (status, body) =
            send_json(&t.app, Method::POST, "/v1/facts/fetch-many", Some(json!({ "count": bad }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Fact count must be between 1 and 10");
    }

    let (status, body) =
        send_json(&t.app, Method::POST, "/v1/facts/fetch-many", Some(json!({ "count": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["facts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_fact_commands() {
    let t = test_app(vec![]);
    let fact = seed(&t.store, "Cats can rotate their ears.");
    let id = fact.id;

    let (_, body) = send_json(&t.app, Method::POST, &format!("/v1/facts/{}/favorite", id), None).await;
    assert_eq!(body["success"], true);

    let (status, body) =
        send_json(&t.app, Method::POST, &format!("/v1/facts/{}/rate", id), Some(json!({ "rating": 7 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Rating must be between 1 and 5");

    let (status, body) =
        send_json(&t.app, Method::POST, &format!("/v1/facts/{}/rate", id), Some(json!({ "rating": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send_json(&t.app, Method::GET, &format!("/v1/facts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 4);
    assert_eq!(body["is_favorite"], true);

    let (_, body) = send_json(&t.app, Method::DELETE, &format!("/v1/facts/{}", id), None).await;
    assert_eq!(body["success"], true);

    let (status, _) = send(&t.app, Method::GET, &format!("/v1/facts/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send_json(&t.app, Method::DELETE, &format!("/v1/facts/{}", id), None).await;
    assert_eq!(body["success"], false);
    let (_, body) = send_json(&t.app, Method::POST, "/v1/facts/999/favorite", None).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_filter_and_categories_routes() {
    let t = test_app(vec![]);
    let ear = seed(&t.store, "Cats have 32 muscles in each ear.");
    seed(&t.store, "Cats sleep a lot.");
    t.store.toggle_favorite(ear.id).unwrap();

    let (status, body) = send_json(
        &t.app,
        Method::GET,
        "/v1/facts?only_favorites=true&category=anatomy",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let facts = body.as_array().unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0]["id"], ear.id);

    let (_, body) = send_json(&t.app, Method::GET, "/v1/facts?search_term=SLEEP&category=", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send_json(&t.app, Method::GET, "/v1/facts", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = send_json(&t.app, Method::GET, "/v1/categories", None).await;
    assert_eq!(body, json!(["anatomy", "behavior"]));
}

#[tokio::test]
async fn test_export_route_returns_attachment_and_cleans_up() {
    let t = test_app(vec![]);
    seed(&t.store, "Cats have 32 muscles in each ear.");
    seed(&t.store, "Cats sleep a lot.");

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/v1/export")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "category": "behavior" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"cat_facts_export_"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let report = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(report.contains("Fact count: 1\n"));
    assert!(report.contains("Cats sleep a lot."));

    let leftovers = std::fs::read_dir(t.export_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_export_route_without_body_exports_all() {
    let t = test_app(vec![]);
    seed(&t.store, "One.");
    seed(&t.store, "Two.");

    let (status, bytes) = send(&t.app, Method::POST, "/v1/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("Fact count: 2\n"));
}

#[tokio::test]
async fn test_export_route_rejects_malformed_filter() {
    let t = test_app(vec![]);
    seed(&t.store, "Cats have 32 muscles in each ear.");
    seed(&t.store, "Cats sleep a lot.");

    for body in [
        json!({ "category": "behavior", "date_to": "2026-13-45" }),
        json!({ "min_rating": "high" }),
        json!("behavior"),
    ] {
        let (status, reply) = send_json(&t.app, Method::POST, "/v1/export", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["success"], false);
        assert!(reply["message"].as_str().unwrap().starts_with("Invalid export filter"));
    }

    let leftovers = std::fs::read_dir(t.export_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_health_and_upstream_routes() {
    let t = test_app(vec![]);
    seed(&t.store, "One.");

    let (status, body) = send_json(&t.app, Method::GET, "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["total_facts"], 1);

    let (_, body) = send_json(&t.app, Method::GET, "/v1/upstream", None).await;
    assert_eq!(body["available"], true);
}
