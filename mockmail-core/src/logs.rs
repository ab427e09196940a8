//! Log correlation - finds the log events of one assistant request
//!
//! The backend tags its structured log lines with `requestId`. We query the
//! log store for a trailing time window, trying each [`FilterStrategy`] in
//! order until one returns events. A store failure never reaches the caller;
//! it becomes a single [`LogEvent::unavailable`] event.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LogsConfig;
use crate::models::LogEvent;

// ============================================================================
// Filter strategies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Structured match on the JSON `requestId` field.
    ExactRequestId,
    /// Plain term match on the quoted id anywhere in the line.
    QuotedLiteral,
}

impl FilterStrategy {
    pub const DEFAULT_ORDER: [FilterStrategy; 2] =
        [FilterStrategy::ExactRequestId, FilterStrategy::QuotedLiteral];

    pub fn pattern(&self, request_id: &str) -> String {
        match self {
            FilterStrategy::ExactRequestId => format!("{{ $.requestId = \"{}\" }}", request_id),
            FilterStrategy::QuotedLiteral => format!("\"{}\"", request_id),
        }
    }
}

// ============================================================================
// LogStore trait
// ============================================================================

/// One filter query against the log store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Window start, epoch milliseconds.
    pub start_time: i64,
    /// Window end, epoch milliseconds.
    pub end_time: i64,
    pub filter_pattern: String,
    pub limit: u32,
}

#[derive(Error, Debug)]
pub enum LogStoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Log store error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Log store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn filter_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>, LogStoreError>;
}

#[async_trait]
impl<T: LogStore + ?Sized> LogStore for Arc<T> {
    async fn filter_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>, LogStoreError> {
        (**self).filter_events(query).await
    }
}

// ============================================================================
// HttpLogStore
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterLogEventsRequest<'a> {
    log_group_name: &'a str,
    start_time: i64,
    end_time: i64,
    filter_pattern: &'a str,
    limit: u32,
    interleaved: bool,
}

#[derive(Debug, Deserialize)]
struct FilterLogEventsResponse {
    #[serde(default)]
    events: Vec<LogEvent>,
}

#[derive(Debug, Deserialize)]
struct LogStoreErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Managed log service client speaking the JSON `FilterLogEvents` API.
///
/// Requests are not SigV4-signed. Authentication is an optional bearer token
/// (`MOCKMAIL_LOGS_TOKEN`), so `logs.endpoint_url` must point at a signing
/// gateway or another endpoint that accepts that token. Talking to the
/// managed service directly needs a signed [`LogStore`] implementation.
#[derive(Debug, Clone)]
pub struct HttpLogStore {
    client: Client,
    endpoint_url: String,
    log_group: String,
    token: Option<String>,
}

impl HttpLogStore {
    const TARGET: &'static str = "Logs_20140328.FilterLogEvents";

    pub fn new(config: &LogsConfig, token: Option<String>) -> Result<Self, LogStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            log_group: config.log_group.clone(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Build from config, reading the bearer token from `MOCKMAIL_LOGS_TOKEN`.
    pub fn from_env(config: &LogsConfig) -> Result<Self, LogStoreError> {
        Self::new(config, std::env::var("MOCKMAIL_LOGS_TOKEN").ok())
    }

    pub fn log_group(&self) -> &str {
        &self.log_group
    }
}

#[async_trait]
impl LogStore for HttpLogStore {
    async fn filter_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>, LogStoreError> {
        let request = FilterLogEventsRequest {
            log_group_name: &self.log_group,
            start_time: query.start_time,
            end_time: query.end_time,
            filter_pattern: &query.filter_pattern,
            limit: query.limit,
            interleaved: true,
        };

        let mut builder = self
            .client
            .post(&self.endpoint_url)
            .header("Content-Type", "application/x-amz-json-1.1")
            .header("X-Amz-Target", Self::TARGET)
            .body(
                serde_json::to_vec(&request)
                    .map_err(|e| LogStoreError::Unavailable(e.to_string()))?,
            );
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<LogStoreErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(LogStoreError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: FilterLogEventsResponse = serde_json::from_str(&body)
            .map_err(|e| LogStoreError::Unavailable(format!("invalid response: {}", e)))?;
        Ok(parsed.events)
    }
}

// ============================================================================
// LogCorrelator
// ============================================================================

pub struct LogCorrelator<S> {
    store: S,
    strategies: Vec<FilterStrategy>,
    enabled: bool,
}

impl<S: LogStore> LogCorrelator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            strategies: FilterStrategy::DEFAULT_ORDER.to_vec(),
            enabled: true,
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<FilterStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// A disabled correlator answers every lookup with no events.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn strategies(&self) -> &[FilterStrategy] {
        &self.strategies
    }

    /// Events for `request_id` in the last `lookback_minutes`, at most `limit`.
    pub async fn fetch_logs(
        &self,
        request_id: Option<&str>,
        limit: u32,
        lookback_minutes: i64,
    ) -> Vec<LogEvent> {
        let request_id = match request_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return Vec::new(),
        };
        if !self.enabled {
            tracing::debug!(request_id = %request_id, "Log lookup skipped: correlator disabled");
            return Vec::new();
        }

        let end_time = Utc::now().timestamp_millis();
        let start_time = end_time.saturating_sub(lookback_minutes.max(0).saturating_mul(60_000));

        for strategy in &self.strategies {
            let query = LogQuery {
                start_time,
                end_time,
                filter_pattern: strategy.pattern(request_id),
                limit,
            };

            match self.store.filter_events(&query).await {
                Ok(events) if !events.is_empty() => {
                    tracing::info!(
                        request_id = %request_id,
                        strategy = ?strategy,
                        count = events.len(),
                        "Fetched correlated log events"
                    );
                    return events;
                }
                Ok(_) => {
                    tracing::debug!(
                        request_id = %request_id,
                        strategy = ?strategy,
                        "No log events matched, trying next filter"
                    );
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Log store query failed");
                    return vec![LogEvent::unavailable(e)];
                }
            }
        }

        Vec::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
