use serde::{Deserialize, Serialize};

/// A log-store event, passed through untouched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEvent(pub serde_json::Value);

impl LogEvent {
    /// Stand-in event returned when the log store cannot be queried.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self(serde_json::json!({
            "message": format!("Unable to fetch logs: {}", reason),
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }))
    }

    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(|m| m.as_str())
    }
}
