use serde::{Deserialize, Serialize};

/// Outcome of one assistant call. Failures are folded into `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub result: String,
    pub trace: Option<serde_json::Value>,
    pub request_id: Option<String>,
}

impl InferenceResult {
    pub fn failed(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            trace: None,
            request_id: None,
        }
    }
}
