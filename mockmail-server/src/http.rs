//! MockMail HTTP API
//!
//! Axum-based HTTP server acting as the UI shell: it collects composed
//! messages, renders stored records with their assistant suggestions, and
//! exposes log lookups keyed by request id.
//!
//! Each endpoint is a thin axum handler delegating to an inner function that
//! returns `(StatusCode, serde_json::Value)` and is testable without dispatch.
//!
//! Endpoints:
//! - GET  /health                                   - liveness + configured backends
//! - GET  /version                                  - server version info
//! - POST /sessions                                 - open a session
//! - DELETE /sessions/:session_id                   - close a session
//! - POST /sessions/:session_id/messages            - compose (and analyze) a message
//! - GET  /sessions/:session_id/messages            - inbox, newest first
//! - GET  /sessions/:session_id/messages/:id        - open a message (marks read)
//! - POST /sessions/:session_id/messages/:id/analyze - lazy suggestion
//! - GET  /sessions/:session_id/messages/:id/logs   - correlated log events
//! - POST /suggest                                  - one-off suggestion
//! - GET  /logs/:request_id                         - log events by request id

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use mockmail_core::{Assistant, MessageDraft, MockMailConfig, MockMailError};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::registry::SessionRegistry;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub assistant: Assistant,
    pub registry: SessionRegistry,
    pub config: MockMailConfig,
}

impl HttpState {
    pub fn new(assistant: Assistant, config: MockMailConfig) -> Self {
        Self {
            assistant,
            registry: SessionRegistry::new(),
            config,
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/:session_id", delete(delete_session_handler))
        .route(
            "/sessions/:session_id/messages",
            get(list_messages_handler).post(compose_handler),
        )
        .route("/sessions/:session_id/messages/:id", get(open_message_handler))
        .route("/sessions/:session_id/messages/:id/analyze", post(analyze_handler))
        .route("/sessions/:session_id/messages/:id/logs", get(message_logs_handler))
        .route("/suggest", post(suggest_handler))
        .route("/logs/:request_id", get(logs_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    assistant: Assistant,
    config: MockMailConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState::new(assistant, config));

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("MockMail HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

fn default_analyze() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct ComposeRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub thread_id: Option<String>,
    /// Ask for a suggestion at submit time; otherwise wait for /analyze.
    #[serde(default = "default_analyze")]
    pub analyze: bool,
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub query: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogParams {
    pub limit: Option<u32>,
    pub lookback_minutes: Option<i64>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

fn error_body(status: StatusCode, msg: impl std::fmt::Display) -> (StatusCode, serde_json::Value) {
    (
        status,
        serde_json::json!({
            "error": msg.to_string(),
            "status": "error",
        }),
    )
}

fn error_response(e: MockMailError) -> (StatusCode, serde_json::Value) {
    let status = match e {
        MockMailError::Validation(_) => StatusCode::BAD_REQUEST,
        MockMailError::MessageNotFound(_) | MockMailError::SessionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, e)
}

fn to_json<T: serde::Serialize>(status: StatusCode, value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(v) => (status, v),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Inner health - reports the configured backends (no IO).
pub fn health_inner(config: &MockMailConfig) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "inference_endpoint": config.inference.endpoint_url,
            "log_group": config.logs.log_group,
            "logs_enabled": config.logs.enabled,
        }),
    )
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "mockmail/1",
    })
}

pub async fn create_session_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let id = state.registry.create().await;
    (StatusCode::CREATED, serde_json::json!({ "session_id": id }))
}

pub async fn delete_session_inner(
    state: &HttpState,
    session_id: &str,
) -> (StatusCode, serde_json::Value) {
    match state.registry.remove(session_id).await {
        Ok(()) => (
            StatusCode::OK,
            serde_json::json!({ "session_id": session_id, "deleted": true }),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn compose_inner(
    state: &HttpState,
    session_id: &str,
    req: ComposeRequest,
) -> (StatusCode, serde_json::Value) {
    let session = match state.registry.get(session_id).await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    let draft = MessageDraft {
        to: req.to,
        subject: req.subject,
        body: req.body,
        thread_id: req.thread_id,
    };

    match state.assistant.compose(&session, draft, req.analyze).await {
        Ok(record) => to_json(StatusCode::CREATED, &state.assistant.view(record)),
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Compose rejected");
            error_response(e)
        }
    }
}

pub async fn list_messages_inner(
    state: &HttpState,
    session_id: &str,
) -> (StatusCode, serde_json::Value) {
    let session = match state.registry.get(session_id).await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    let records: Vec<_> = {
        let ctx = session.lock().await;
        ctx.store.list_newest_first().cloned().collect()
    };
    let views: Vec<_> = records
        .into_iter()
        .map(|r| state.assistant.view(r))
        .collect();

    let count = views.len();
    match serde_json::to_value(&views) {
        Ok(messages) => (
            StatusCode::OK,
            serde_json::json!({ "messages": messages, "count": count }),
        ),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn open_message_inner(
    state: &HttpState,
    session_id: &str,
    id: i64,
) -> (StatusCode, serde_json::Value) {
    let session = match state.registry.get(session_id).await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    let record = session.lock().await.store.mark_read(id).cloned();
    match record {
        Ok(r) => to_json(StatusCode::OK, &state.assistant.view(r)),
        Err(e) => error_response(e),
    }
}

pub async fn analyze_inner(
    state: &HttpState,
    session_id: &str,
    id: i64,
) -> (StatusCode, serde_json::Value) {
    let session = match state.registry.get(session_id).await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    match state.assistant.analyze(&session, id).await {
        Ok(r) => to_json(StatusCode::OK, &state.assistant.view(r)),
        Err(e) => error_response(e),
    }
}

pub async fn message_logs_inner(
    state: &HttpState,
    session_id: &str,
    id: i64,
    params: LogParams,
) -> (StatusCode, serde_json::Value) {
    let session = match state.registry.get(session_id).await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    match state
        .assistant
        .message_logs(&session, id, params.limit, params.lookback_minutes)
        .await
    {
        Ok((request_id, events)) => (
            StatusCode::OK,
            serde_json::json!({ "request_id": request_id, "events": events }),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn suggest_inner(state: &HttpState, req: SuggestRequest) -> (StatusCode, serde_json::Value) {
    let query = match req.query {
        Some(q) if !q.trim().is_empty() => q,
        _ => return error_body(StatusCode::BAD_REQUEST, "query field is required"),
    };
    let thread_id = req.thread_id.filter(|t| !t.trim().is_empty());

    let suggestion = state.assistant.suggest(&query, thread_id.as_deref()).await;
    to_json(StatusCode::OK, &suggestion)
}

pub async fn logs_inner(
    state: &HttpState,
    request_id: &str,
    params: LogParams,
) -> (StatusCode, serde_json::Value) {
    let events = state
        .assistant
        .logs_for(Some(request_id), params.limit, params.lookback_minutes)
        .await;
    (
        StatusCode::OK,
        serde_json::json!({ "request_id": request_id, "events": events }),
    )
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.config);
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn create_session_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = create_session_inner(&state).await;
    (status, Json(body))
}

pub async fn delete_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_session_inner(&state, &session_id).await;
    (status, Json(body))
}

pub async fn compose_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ComposeRequest>,
) -> impl IntoResponse {
    let (status, body) = compose_inner(&state, &session_id, req).await;
    (status, Json(body))
}

pub async fn list_messages_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = list_messages_inner(&state, &session_id).await;
    (status, Json(body))
}

pub async fn open_message_handler(
    State(state): State<Arc<HttpState>>,
    Path((session_id, id)): Path<(String, i64)>,
) -> impl IntoResponse {
    let (status, body) = open_message_inner(&state, &session_id, id).await;
    (status, Json(body))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    Path((session_id, id)): Path<(String, i64)>,
) -> impl IntoResponse {
    let (status, body) = analyze_inner(&state, &session_id, id).await;
    (status, Json(body))
}

pub async fn message_logs_handler(
    State(state): State<Arc<HttpState>>,
    Path((session_id, id)): Path<(String, i64)>,
    Query(params): Query<LogParams>,
) -> impl IntoResponse {
    let (status, body) = message_logs_inner(&state, &session_id, id, params).await;
    (status, Json(body))
}

pub async fn suggest_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SuggestRequest>,
) -> impl IntoResponse {
    let (status, body) = suggest_inner(&state, req).await;
    (status, Json(body))
}

pub async fn logs_handler(
    State(state): State<Arc<HttpState>>,
    Path(request_id): Path<String>,
    Query(params): Query<LogParams>,
) -> impl IntoResponse {
    let (status, body) = logs_inner(&state, &request_id, params).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================
