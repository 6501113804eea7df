//! HTTP surface tests

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use deployd::app::options::ServerOptions;
use deployd::errors::OrchestratorError;
use deployd::models::deployment::RemoteState;
use deployd::models::project::ProjectStatus;
use deployd::server::serve::{router, serve};
use deployd::server::state::ServerState;
use deployd::store::memory::MemoryProjectStore;

use crate::support::{descriptor, fast_settings, generated_project, orchestrator, ScriptedProvider};

fn app(provider: ScriptedProvider, store: Arc<MemoryProjectStore>) -> Router {
    let orchestrator = orchestrator(Arc::new(provider), store, fast_settings());
    router(Arc::new(ServerState::new(Arc::new(orchestrator), 3)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let store = Arc::new(MemoryProjectStore::new());
    let request = Request::get("/health").body(Body::empty()).unwrap();

    let (status, body) = send(app(ScriptedProvider::new(), store), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "deployd");
}

#[tokio::test]
async fn test_start_deployment_endpoint() {
    let store = Arc::new(MemoryProjectStore::with_projects(vec![generated_project("p1")]));
    let provider = ScriptedProvider::new().on_create(Ok(descriptor("d1", RemoteState::Building)));
    let request = post_json(
        "/deployments",
        json!({
            "projectId": "p1",
            "userId": "u1",
            "providerToken": "tok",
            "targetName": "My Shop",
            "sourceRepo": "acme/shop",
        }),
    );

    let (status, body) = send(app(provider, store.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "deploymentId": "d1", "deploymentUrl": "https://d1.host"})
    );
    assert_eq!(store.get("p1").unwrap().status, ProjectStatus::Deploying);
}

#[tokio::test]
async fn test_status_endpoint() {
    let store = Arc::new(MemoryProjectStore::with_projects(vec![generated_project("p1")]));

    let found = Request::get("/projects/p1/deployment?user_id=u1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(ScriptedProvider::new(), store.clone()), found).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "draft");
    assert_eq!(body["deploymentUrl"], Value::Null);

    let missing = Request::get("/projects/p1/deployment?user_id=u2")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(ScriptedProvider::new(), store), missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_cancel_endpoint_reports_outcome() {
    let store = Arc::new(MemoryProjectStore::with_projects(vec![generated_project("p1")]));
    let request = post_json("/projects/p1/deployment/cancel", json!({"userId": "u1"}));

    let (status, body) = send(app(ScriptedProvider::new(), store), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No deployment in progress to cancel");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_retry_endpoint_requires_repository() {
    let store = Arc::new(MemoryProjectStore::with_projects(vec![
        deployd::models::project::Project::new("p1", "u1", "Shop"),
    ]));
    let request = post_json(
        "/projects/p1/deployment/retry",
        json!({"userId": "u1", "providerToken": "tok", "targetName": "Shop"}),
    );

    let (_, body) = send(app(ScriptedProvider::new(), store), request).await;

    assert_eq!(body["error"], "Project must be generated before deployment");
}

#[tokio::test]
async fn test_cleanup_endpoint() {
    let mut project = generated_project("p1");
    project.status = ProjectStatus::Failed;
    project.updated_at = Utc::now() - chrono::Duration::days(3);
    let store = Arc::new(MemoryProjectStore::with_projects(vec![project]));

    let request = post_json("/maintenance/cleanup?days=2", json!({}));
    let (status, body) = send(app(ScriptedProvider::new(), store.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reset": 1}));
    assert_eq!(store.get("p1").unwrap().status, ProjectStatus::Pending);
}

#[tokio::test]
async fn test_serve_reports_bind_failure() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let options = ServerOptions {
        host: "127.0.0.1".to_string(),
        port: taken.local_addr().unwrap().port(),
    };
    let orchestrator = orchestrator(
        Arc::new(ScriptedProvider::new()),
        Arc::new(MemoryProjectStore::new()),
        fast_settings(),
    );
    let state = Arc::new(ServerState::new(Arc::new(orchestrator), 3));

    let result = serve(&options, state, async {}).await;

    assert!(matches!(result, Err(OrchestratorError::ServerError(_))));
}
