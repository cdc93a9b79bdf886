//! Integration tests: drive the composio routes against an in-process
//! Composio fake.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dojo_core::composio::testing::FakeComposio;
use dojo_core::composio::ComposioApi;
use dojo_server::{build_router, create_app_state_with};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(fake: Arc<FakeComposio>) -> axum::Router {
    let state = create_app_state_with(":memory:", Some(fake as Arc<dyn ComposioApi>)).unwrap();
    build_router(state, None)
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = app_with(Arc::new(FakeComposio::default()));
    let (status, body) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_initiate_then_poll_is_pending() {
    let app = app_with(Arc::new(FakeComposio::default()));

    let (status, body) = call(
        &app,
        post_json(
            "/api/v1/composio/connections/initiate",
            json!({ "toolkit_slug": "gmail", "user_id": "alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["toolkit_slug"], "gmail");
    let connection_id = body["data"]["connection_id"].as_str().unwrap().to_string();
    assert!(body["data"]["auth_url"]
        .as_str()
        .unwrap()
        .contains(&connection_id));

    let (status, body) = call(
        &app,
        get(&format!("/api/v1/composio/connections/{}/status", connection_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connection_id"], connection_id.as_str());
    assert_eq!(body["data"]["status"], "PENDING");
}

#[tokio::test]
async fn test_initiate_rejects_unknown_toolkit_and_blank_user() {
    let app = app_with(Arc::new(FakeComposio::default()));

    let (status, body) = call(
        &app,
        post_json(
            "/api/v1/composio/connections/initiate",
            json!({ "toolkit_slug": "myspace", "user_id": "alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_TOOLKIT");

    let (status, body) = call(
        &app,
        post_json(
            "/api/v1/composio/connections/initiate",
            json!({ "toolkit_slug": "gmail", "user_id": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_json_bodies_use_error_body() {
    let app = app_with(Arc::new(FakeComposio::default()));

    let request = Request::post("/api/v1/composio/connections/initiate")
        .header("content-type", "application/json")
        .body(Body::from("{\"toolkit_slug\": "))
        .unwrap();
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let (status, body) = call(
        &app,
        post_json("/api/v1/composio/tools/execute", json!({ "user_id": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_upstream_failure_on_initiate_is_500_with_code() {
    let fake = Arc::new(FakeComposio::default());
    fake.fail_next_initiate();
    let app = app_with(fake);

    let (status, body) = call(
        &app,
        post_json(
            "/api/v1/composio/connections/initiate",
            json!({ "toolkit_slug": "github", "user_id": "alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "CONNECTION_INITIATION_FAILED");
}

#[tokio::test]
async fn test_unknown_connection_status_is_404() {
    let app = app_with(Arc::new(FakeComposio::default()));
    let (status, body) = call(&app, get("/api/v1/composio/connections/ca_nope/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_user_connections_and_disconnect() {
    let fake = Arc::new(FakeComposio::default());
    let app = app_with(fake.clone());

    let (_, body) = call(
        &app,
        post_json(
            "/api/v1/composio/connections/initiate",
            json!({ "toolkit_slug": "slack", "user_id": "bob" }),
        ),
    )
    .await;
    let connection_id = body["data"]["connection_id"].as_str().unwrap().to_string();

    let (_, body) = call(&app, get("/api/v1/composio/users/bob/connections")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    fake.set_status(&connection_id, "ACTIVE");
    let (status, body) = call(&app, get("/api/v1/composio/users/bob/connections")).await;
    assert_eq!(status, StatusCode::OK);
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["app_type"], "slack");
    assert_eq!(list[0]["status"], "ACTIVE");

    let request = Request::delete(format!("/api/v1/composio/connections/{}", connection_id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connection_id"], connection_id.as_str());

    let (_, body) = call(&app, get("/api/v1/composio/users/bob/connections")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_toolkits_tools_and_metadata() {
    let app = app_with(Arc::new(FakeComposio::default()));

    let (status, body) = call(&app, get("/api/v1/composio/toolkits?search=google")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = call(&app, get("/api/v1/composio/toolkits/gmail/tools")).await;
    assert_eq!(status, StatusCode::OK);
    let tools = body["data"].as_array().unwrap();
    assert_eq!(tools[0]["slug"], "GMAIL_SEND_EMAIL");
    assert_eq!(
        tools[0]["input_parameters"]["required"],
        json!(["recipient_email"])
    );

    let (status, body) = call(&app, get("/api/v1/composio/toolkits/gmail/metadata")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "gmail");
}

#[tokio::test]
async fn test_execute_tool_reports_failure_in_body() {
    let app = app_with(Arc::new(FakeComposio::default()));

    let (status, body) = call(
        &app,
        post_json(
            "/api/v1/composio/tools/execute",
            json!({
                "tool_slug": "GMAIL_SEND_EMAIL",
                "user_id": "carol",
                "parameters": { "recipient_email": "dave@example.com" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["result"]["echo"]["recipient_email"],
        "dave@example.com"
    );

    let (status, body) = call(
        &app,
        post_json(
            "/api/v1/composio/tools/execute",
            json!({ "tool_slug": "BROKEN_TOOL", "user_id": "carol" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["success"], false);
    assert!(body["data"]["error"].is_string());
}

#[tokio::test]
async fn test_routes_are_unavailable_without_composio() {
    let state = create_app_state_with(":memory:", None).unwrap();
    let app = build_router(state, None);

    let (status, body) = call(&app, get("/api/v1/composio/toolkits")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "COMPOSIO_UNAVAILABLE");

    let (status, _) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_static_dir_falls_back_to_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>dojo</html>").unwrap();

    let state = create_app_state_with(":memory:", None).unwrap();
    let app = build_router(state, dir.path().to_str());

    let response = app.oneshot(get("/integrations/gmail")).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<html>dojo</html>");
}

#[tokio::test]
async fn test_remote_client_against_live_server() {
    use dojo_core::remote::DojoClient;

    let fake = Arc::new(FakeComposio::default());
    let app = app_with(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = DojoClient::new(format!("http://{}", addr)).unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health["status"], "healthy");

    let initiated = client.initiate_connection("notion", "erin").await.unwrap();
    assert_eq!(initiated.toolkit_slug, "notion");

    fake.set_status(&initiated.connection_id, "ACTIVE");
    let status = client
        .connection_status(&initiated.connection_id)
        .await
        .unwrap();
    assert_eq!(status.status, dojo_core::models::ConnectionStatus::Active);

    let err = client.connection_status("ca_missing").await.unwrap_err();
    assert!(matches!(err, dojo_core::ServerError::NotFound(_)));

    let toolkits = client.list_toolkits(Some("git"), None).await.unwrap();
    assert_eq!(toolkits.len(), 1);
    assert_eq!(toolkits[0].slug, "github");
}
