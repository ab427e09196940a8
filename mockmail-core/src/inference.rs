//! Inference client - forwards a mail body to the hosted assistant endpoint
//!
//! The endpoint takes `{"input": {"query", "thread_id"}}` and answers with
//! `{"result"?, "trace"?, "request_id"?}`. Callers never see an `Err`:
//! transport, status and decode failures are folded into
//! [`InferenceResult::result`] behind [`ERROR_PREFIX`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::InferenceConfig;
use crate::models::InferenceResult;

/// Prefix of the user-facing string returned when the endpoint is unreachable.
pub const ERROR_PREFIX: &str = "⚠️ Error connecting to AI Agent: ";

/// Shown when the endpoint answers without a `result` key.
pub const MISSING_RESULT_PLACEHOLDER: &str =
    "AI Suggestion received, but output key was missing.";

// ============================================================================
// InferenceBackend trait
// ============================================================================

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Ask the assistant for a suggested reply. Never fails.
    async fn submit(&self, query: &str, thread_id: Option<&str>) -> InferenceResult;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct AssistantRequest<'a> {
    input: AssistantInput<'a>,
}

#[derive(Debug, Serialize)]
struct AssistantInput<'a> {
    query: &'a str,
    thread_id: &'a str,
}

#[derive(Debug)]
struct AssistantResponse {
    result: Option<serde_json::Value>,
    trace: Option<serde_json::Value>,
    request_id: Option<serde_json::Value>,
}

impl AssistantResponse {
    /// Only a JSON object is a response; arrays and scalars are rejected
    /// rather than read positionally.
    fn from_body(body: &str) -> Result<Self, InferenceError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| InferenceError::InvalidBody(e.to_string()))?;

        let mut object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(InferenceError::InvalidBody(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(Self {
            result: object.remove("result"),
            trace: object.remove("trace"),
            request_id: object.remove("request_id"),
        })
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ============================================================================
// HttpInferenceClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    endpoint_url: String,
    missing_result_placeholder: String,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            missing_result_placeholder: config.missing_result_placeholder.clone(),
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    async fn submit_once(
        &self,
        query: &str,
        thread_id: Option<&str>,
    ) -> Result<InferenceResult, InferenceError> {
        let request = AssistantRequest {
            input: AssistantInput {
                query,
                thread_id: thread_id.unwrap_or(""),
            },
        };

        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            return Err(InferenceError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed = AssistantResponse::from_body(&body)?;

        let result = match parsed.result {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => self.missing_result_placeholder.clone(),
            Some(other) => other.to_string(),
        };

        let trace = parsed.trace.filter(|t| !t.is_null());

        let request_id = match parsed.request_id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(InferenceResult {
            result,
            trace,
            request_id,
        })
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    async fn submit(&self, query: &str, thread_id: Option<&str>) -> InferenceResult {
        match self.submit_once(query, thread_id).await {
            Ok(result) => {
                tracing::info!(
                    request_id = result.request_id.as_deref().unwrap_or("-"),
                    has_trace = result.trace.is_some(),
                    "Assistant suggestion received"
                );
                result
            }
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint_url, error = %e, "Assistant call failed");
                InferenceResult::failed(format!("{}{}", ERROR_PREFIX, e))
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> HttpInferenceClient {
        HttpInferenceClient::new(&InferenceConfig {
            endpoint_url: base_url,
            timeout_seconds: 5,
            missing_result_placeholder: MISSING_RESULT_PLACEHOLDER.to_string(),
        })
        .expect("Failed to create client")
    }

    #[tokio::test]
    async fn test_submit_posts_input_payload_and_parses_response() {
        let mock_server = MockServer::start().await;
        let client = test_client(format!("{}/", mock_server.uri()));

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(serde_json::json!({
                "input": { "query": "hello", "thread_id": "t-1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "reply text",
                "trace": [{ "trace": {} }],
                "request_id": "r1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client.submit("hello", Some("t-1")).await;

        assert_eq!(result.result, "reply text");
        assert_eq!(result.request_id.as_deref(), Some("r1"));
        assert!(result.trace.is_some());
    }

    #[tokio::test]
    async fn test_submit_sends_empty_thread_id_when_absent() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "input": { "query": "hello", "thread_id": "" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client.submit("hello", None).await;
        assert_eq!(result.result, "ok");
        assert!(result.trace.is_none());
        assert!(result.request_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_result_uses_placeholder() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "request_id": 42, "trace": null })),
            )
            .mount(&mock_server)
            .await;

        let result = client.submit("hello", None).await;
        assert_eq!(result.result, MISSING_RESULT_PLACEHOLDER);
        assert_eq!(result.request_id.as_deref(), Some("42"));
        assert!(result.trace.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_folded_into_result() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let result = client.submit("hello", None).await;
        assert!(result.result.starts_with(ERROR_PREFIX), "got: {}", result.result);
        assert!(result.result.contains("502"));
        assert!(result.trace.is_none());
        assert!(result.request_id.is_none());
    }

    #[tokio::test]
    async fn test_non_json_body_is_folded_into_result() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let result = client.submit("hello", None).await;
        assert!(result.result.starts_with(ERROR_PREFIX));
        assert!(result.request_id.is_none());
    }

    #[tokio::test]
    async fn test_array_body_is_not_read_positionally() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!(["hijacked", null, "rid"])),
            )
            .mount(&mock_server)
            .await;

        let result = client.submit("hello", None).await;
        assert!(result.result.starts_with(ERROR_PREFIX), "got: {}", result.result);
        assert!(result.result.contains("an array"));
        assert!(result.trace.is_none());
        assert!(result.request_id.is_none());
    }

    #[tokio::test]
    async fn test_scalar_bodies_are_decode_failures() {
        for body in [serde_json::json!("just text"), serde_json::json!(42)] {
            let mock_server = MockServer::start().await;
            let client = test_client(mock_server.uri());

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&mock_server)
                .await;

            let result = client.submit("hello", None).await;
            assert!(
                result.result.starts_with(ERROR_PREFIX),
                "body {} gave: {}",
                body,
                result.result
            );
            assert!(result.request_id.is_none());
        }
    }

    #[test]
    fn test_from_body_reads_object_keys() {
        let parsed = AssistantResponse::from_body(
            r#"{"result": "ok", "request_id": "r9", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(parsed.result, Some(serde_json::json!("ok")));
        assert_eq!(parsed.request_id, Some(serde_json::json!("r9")));
        assert!(parsed.trace.is_none());
    }

    #[tokio::test]
    async fn test_connection_failure_is_folded_into_result() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(format!("http://{}/", addr));
        let result = client.submit("hello", None).await;

        assert!(result.result.starts_with(ERROR_PREFIX), "got: {}", result.result);
        assert!(result.trace.is_none());
        assert!(result.request_id.is_none());
    }
}
