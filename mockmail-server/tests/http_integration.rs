//! HTTP integration tests for the MockMail REST API
//!
//! The inference endpoint and the log store are both wiremock servers, so the
//! full path runs: router → assistant → reqwest clients → mock backends.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mockmail_core::{Assistant, HttpInferenceClient, HttpLogStore, MockMailConfig, ERROR_PREFIX};
use mockmail_server::http::{build_router, HttpState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    app: Router,
    assistant_server: MockServer,
    logs_server: MockServer,
}

async fn harness() -> Harness {
    let assistant_server = MockServer::start().await;
    let logs_server = MockServer::start().await;

    let mut config = MockMailConfig::default();
    config.inference.endpoint_url = format!("{}/", assistant_server.uri());
    config.inference.timeout_seconds = 5;
    config.logs.endpoint_url = logs_server.uri();
    config.logs.log_group = "/aws/lambda/mockmail-test".to_string();

    let inference = HttpInferenceClient::new(&config.inference).unwrap();
    let log_store = HttpLogStore::new(&config.logs, None).unwrap();
    let assistant = Assistant::new(Arc::new(inference), Arc::new(log_store), &config);

    Harness {
        app: build_router(Arc::new(HttpState::new(assistant, config))),
        assistant_server,
        logs_server,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn open_session(app: &Router) -> String {
    let (status, body) = call(app, "POST", "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_version_endpoint() {
    let h = harness().await;
    let (status, body) = call(&h.app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "mockmail/1");
}

#[tokio::test]
async fn test_compose_attaches_suggestion_and_lists_newest_first() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "input": { "query": "hello" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "reply text",
            "request_id": "r1"
        })))
        .expect(1)
        .mount(&h.assistant_server)
        .await;

    let sid = open_session(&h.app).await;
    let (status, created) = call(
        &h.app,
        "POST",
        &format!("/sessions/{}/messages", sid),
        Some(json!({ "to": "a@b.com", "subject": "S", "body": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "body: {}", created);
    assert_eq!(created["ai_hint"], "reply text");
    assert_eq!(created["ai_request_id"], "r1");
    assert!(created["ai_trace"].is_null());

    let (status, list) = call(&h.app, "GET", &format!("/sessions/{}/messages", sid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["messages"][0]["id"], created["id"]);
}

#[tokio::test]
async fn test_trace_fields_rendered_from_node_input_trace() {
    let h = harness().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "see below",
            "request_id": "r2",
            "trace": [
                { "trace": { "nodeInputTrace": {
                    "nodeName": "Prompt_1",
                    "fields": [
                        { "nodeInputName": "faq_answer", "content": { "document": "Reset via portal" } },
                        { "nodeInputName": "kb_answer", "content": { "document": "See KB-12" } }
                    ]
                } } }
            ]
        })))
        .mount(&h.assistant_server)
        .await;

    let (status, body) = call(
        &h.app,
        "POST",
        "/suggest",
        Some(json!({ "query": "How do I reset my VPN password?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "see below");
    assert_eq!(body["trace_fields"]["faq_answer"], "Reset via portal");
    assert_eq!(body["trace_fields"]["kb_answer"], "See KB-12");
}

#[tokio::test]
async fn test_endpoint_failure_degrades_to_error_string() {
    let h = harness().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&h.assistant_server)
        .await;

    let sid = open_session(&h.app).await;
    let (status, created) = call(
        &h.app,
        "POST",
        &format!("/sessions/{}/messages", sid),
        Some(json!({ "to": "a@b.com", "subject": "S", "body": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(created["ai_hint"].as_str().unwrap().starts_with(ERROR_PREFIX));
    assert!(created["ai_request_id"].is_null());
    assert!(created["ai_trace"].is_null());
}

#[tokio::test]
async fn test_message_logs_fall_back_to_quoted_filter() {
    let h = harness().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "reply",
            "request_id": "abc123"
        })))
        .mount(&h.assistant_server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "filterPattern": "{ $.requestId = \"abc123\" }" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "events": [] })))
        .expect(1)
        .mount(&h.logs_server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "filterPattern": "\"abc123\"" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{ "message": "START abc123", "timestamp": 1 }]
        })))
        .expect(1)
        .mount(&h.logs_server)
        .await;

    let sid = open_session(&h.app).await;
    let (_, created) = call(
        &h.app,
        "POST",
        &format!("/sessions/{}/messages", sid),
        Some(json!({ "to": "a@b.com", "subject": "S", "body": "hello" })),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = call(
        &h.app,
        "GET",
        &format!("/sessions/{}/messages/{}/logs?limit=10", sid, id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request_id"], "abc123");
    assert_eq!(body["events"][0]["message"], "START abc123");
}

#[tokio::test]
async fn test_log_store_failure_yields_synthetic_event() {
    let h = harness().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&h.logs_server)
        .await;

    let (status, body) = call(&h.app, "GET", "/logs/r1", None).await;

    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Unable to fetch logs"));
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let h = harness().await;
    let (status, body) = call(&h.app, "GET", "/sessions/missing/messages", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_delete_session_route() {
    let h = harness().await;
    let sid = open_session(&h.app).await;

    let (status, body) = call(&h.app, "DELETE", &format!("/sessions/{}", sid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = call(&h.app, "GET", &format!("/sessions/{}/messages", sid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logs_route_accepts_max_lookback() {
    let h = harness().await;
    let (status, body) = call(
        &h.app,
        "GET",
        "/logs/r1?lookback_minutes=9223372036854775807",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request_id"], "r1");
    assert!(body["events"].is_array());
}
