//! HTTP API unit tests

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use rangewatch::errors::WatchError;
use rangewatch::http::StatusSource;
use rangewatch::models::DeploymentSnapshot;
use rangewatch::reconcile::LoggingListener;
use rangewatch::server::serve::router;
use rangewatch::server::state::ServerState;
use rangewatch::store::ResourceStore;
use rangewatch::watch::{WatchContext, Watcher};
use rangewatch::workers::{notifier, poller};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

/// Never answers, so the store only holds what the API puts there
struct SilentSource;

#[async_trait]
impl StatusSource for SilentSource {
    async fn fetch_status(&self, _range_id: &str) -> Result<DeploymentSnapshot, WatchError> {
        std::future::pending().await
    }
}

fn app() -> Router {
    let (signals, _) = broadcast::channel(16);
    let ctx = WatchContext {
        source: Arc::new(SilentSource),
        store: Arc::new(ResourceStore::new()),
        listener: Arc::new(LoggingListener),
        signals,
        poller: poller::Options::default(),
        channel: None,
        notifier: notifier::Options::default(),
    };
    router(Arc::new(ServerState::new(Arc::new(Watcher::new(ctx)))))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "rangewatch");
}

#[tokio::test]
async fn test_watch_lifecycle() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/ranges", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ranges": [], "total": 0}));

    let (status, body) = call(&app, Method::GET, "/ranges/r-1/deployment", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("r-1"));

    let (status, body) = call(&app, Method::POST, "/ranges/r-1/watch", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["changed"], true);
    let (status, body) = call(&app, Method::POST, "/ranges/r-1/watch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);

    let (status, body) = call(&app, Method::GET, "/ranges/r-1/deployment", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rangeId"], "r-1");
    assert_eq!(body["optimistic"], false);

    let (status, _) = call(&app, Method::POST, "/ranges/r-1/refresh", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = call(&app, Method::DELETE, "/ranges/r-1/watch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["watched"], false);
    let (status, _) = call(&app, Method::DELETE, "/ranges/r-1/watch", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_optimistic() {
    let app = app();
    let request = json!({"status": "deploying"});

    let (status, _) = call(&app, Method::POST, "/ranges/r-1/optimistic", Some(request.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    call(&app, Method::POST, "/ranges/r-1/watch", None).await;
    let (status, _) = call(&app, Method::POST, "/ranges/r-1/optimistic", Some(request)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // the overlay is applied by the engine task
    let mut body = Value::Null;
    for _ in 0..50 {
        body = call(&app, Method::GET, "/ranges/r-1/deployment", None).await.1;
        if body["optimistic"] == true {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(body["optimistic"], true);
    assert_eq!(body["status"], "deploying");
}
