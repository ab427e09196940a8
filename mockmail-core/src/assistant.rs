//! Mail assistant flow: compose → suggest → attach → correlate logs
//!
//! Session state is passed in explicitly as a `Mutex<SessionContext>`. The
//! lock is only held while touching the store, never across a network call.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::MockMailConfig;
use crate::inference::{HttpInferenceClient, InferenceBackend};
use crate::logs::{HttpLogStore, LogCorrelator, LogStore};
use crate::models::{ComposedMessage, InferenceResult, LogEvent, MessageDraft};
use crate::session::SessionContext;
use crate::trace::{extract_fields, TraceFieldTable};
use crate::MockMailError;

/// A record as rendered, with its trace fields recomputed.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: ComposedMessage,
    pub trace_fields: TraceFieldTable,
}

/// A direct suggestion, not tied to a stored record.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    #[serde(flatten)]
    pub inference: InferenceResult,
    pub trace_fields: TraceFieldTable,
}

pub struct Assistant {
    inference: Arc<dyn InferenceBackend>,
    correlator: LogCorrelator<Arc<dyn LogStore>>,
    target_node: String,
    default_limit: u32,
    lookback_minutes: i64,
}

impl Assistant {
    pub fn new(
        inference: Arc<dyn InferenceBackend>,
        log_store: Arc<dyn LogStore>,
        config: &MockMailConfig,
    ) -> Self {
        Self {
            inference,
            correlator: LogCorrelator::new(log_store).enabled(config.logs.enabled),
            target_node: config.trace.target_node.clone(),
            default_limit: config.logs.default_limit,
            lookback_minutes: config.logs.lookback_minutes,
        }
    }

    /// Wire the HTTP inference client and log store from config.
    pub fn from_config(config: &MockMailConfig) -> Result<Self, MockMailError> {
        let inference = HttpInferenceClient::new(&config.inference)
            .map_err(|e| MockMailError::Other(format!("inference client: {}", e)))?;
        let log_store = HttpLogStore::from_env(&config.logs)
            .map_err(|e| MockMailError::Other(format!("log store client: {}", e)))?;

        tracing::info!(
            endpoint = %inference.endpoint_url(),
            log_group = %log_store.log_group(),
            "Assistant configured"
        );

        Ok(Self::new(Arc::new(inference), Arc::new(log_store), config))
    }

    pub fn target_node(&self) -> &str {
        &self.target_node
    }

    pub fn trace_fields(&self, trace: Option<&serde_json::Value>) -> TraceFieldTable {
        extract_fields(trace, &self.target_node)
    }

    pub fn view(&self, message: ComposedMessage) -> MessageView {
        let trace_fields = self.trace_fields(message.ai_trace.as_ref());
        MessageView {
            message,
            trace_fields,
        }
    }

    /// Validate and store a new message, optionally asking for a suggestion right away.
    pub async fn compose(
        &self,
        session: &Mutex<SessionContext>,
        draft: MessageDraft,
        analyze_now: bool,
    ) -> Result<ComposedMessage, MockMailError> {
        let draft = draft.validate()?;

        let record = {
            let mut ctx = session.lock().await;
            ctx.store.compose(draft, Utc::now()).clone()
        };
        tracing::info!(message_id = record.id, to = %record.to, "Message composed");

        if !analyze_now {
            return Ok(record);
        }

        tracing::debug!(message_id = record.id, backend = self.inference.name(), "Requesting suggestion");
        let result = self
            .inference
            .submit(&record.body, record.thread_id.as_deref())
            .await;

        let mut ctx = session.lock().await;
        ctx.store.attach_ai_fields(record.id, &result).cloned()
    }

    /// Attach a suggestion to a stored message unless it already has one.
    pub async fn analyze(
        &self,
        session: &Mutex<SessionContext>,
        id: i64,
    ) -> Result<ComposedMessage, MockMailError> {
        let record = {
            let ctx = session.lock().await;
            ctx.store
                .get(id)
                .cloned()
                .ok_or(MockMailError::MessageNotFound(id))?
        };
        if record.is_analyzed() {
            return Ok(record);
        }

        let result = self
            .inference
            .submit(&record.body, record.thread_id.as_deref())
            .await;

        let mut ctx = session.lock().await;
        if let Some(existing) = ctx.store.get(id).filter(|r| r.is_analyzed()) {
            tracing::debug!(message_id = id, "Message analyzed concurrently, keeping first result");
            return Ok(existing.clone());
        }
        ctx.store.attach_ai_fields(id, &result).cloned()
    }

    pub async fn suggest(&self, query: &str, thread_id: Option<&str>) -> Suggestion {
        let inference = self.inference.submit(query, thread_id).await;
        let trace_fields = self.trace_fields(inference.trace.as_ref());
        Suggestion {
            inference,
            trace_fields,
        }
    }

    pub async fn logs_for(
        &self,
        request_id: Option<&str>,
        limit: Option<u32>,
        lookback_minutes: Option<i64>,
    ) -> Vec<LogEvent> {
        self.correlator
            .fetch_logs(
                request_id,
                limit.unwrap_or(self.default_limit),
                lookback_minutes.unwrap_or(self.lookback_minutes),
            )
            .await
    }

    /// Log events for a stored message's request id.
    pub async fn message_logs(
        &self,
        session: &Mutex<SessionContext>,
        id: i64,
        limit: Option<u32>,
        lookback_minutes: Option<i64>,
    ) -> Result<(Option<String>, Vec<LogEvent>), MockMailError> {
        let request_id = {
            let ctx = session.lock().await;
            ctx.store
                .get(id)
                .ok_or(MockMailError::MessageNotFound(id))?
                .ai_request_id
                .clone()
        };
        let events = self
            .logs_for(request_id.as_deref(), limit, lookback_minutes)
            .await;
        Ok((request_id, events))
    }
}
