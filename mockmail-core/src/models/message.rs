use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::InferenceResult;
use crate::MockMailError;

/// Form input as collected by the UI, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDraft {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub thread_id: Option<String>,
}

impl MessageDraft {
    /// Trim every field. Empty `to`, `subject` or `body` is rejected.
    pub fn validate(self) -> Result<MessageDraft, MockMailError> {
        let to = self.to.trim().to_string();
        let subject = self.subject.trim().to_string();
        let body = self.body.trim().to_string();

        if to.is_empty() || subject.is_empty() || body.is_empty() {
            return Err(MockMailError::Validation(
                "Please fill out all fields.".to_string(),
            ));
        }

        let thread_id = self
            .thread_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(MessageDraft {
            to,
            subject,
            body,
            thread_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedMessage {
    /// Creation time in epoch milliseconds, unique within a session.
    pub id: i64,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Wall-clock `HH:MM:SS` shown in the inbox header.
    pub created_at: String,
    pub created: DateTime<Utc>,
    pub read: bool,
    pub ai_hint: Option<String>,
    pub ai_trace: Option<serde_json::Value>,
    pub ai_request_id: Option<String>,
}

impl ComposedMessage {
    pub fn new(id: i64, draft: MessageDraft, created: DateTime<Utc>) -> Self {
        Self {
            id,
            thread_id: draft.thread_id,
            to: draft.to,
            subject: draft.subject,
            body: draft.body,
            created_at: created
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string(),
            created,
            read: false,
            ai_hint: None,
            ai_trace: None,
            ai_request_id: None,
        }
    }

    /// True once an assistant call has completed for this message.
    pub fn is_analyzed(&self) -> bool {
        self.ai_hint.is_some()
    }

    pub fn attach(&mut self, result: &InferenceResult) {
        self.ai_hint = Some(result.result.clone());
        self.ai_trace = result.trace.clone();
        self.ai_request_id = result.request_id.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(to: &str, subject: &str, body: &str) -> MessageDraft {
        MessageDraft {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            thread_id: None,
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let d = draft("  a@b.com ", " S ", "\nhello\n").validate().unwrap();
        assert_eq!(d.to, "a@b.com");
        assert_eq!(d.subject, "S");
        assert_eq!(d.body, "hello");
    }

    #[test]
    fn test_validate_rejects_blank_field() {
        let err = draft("a@b.com", "   ", "hello").validate().unwrap_err();
        assert!(matches!(err, MockMailError::Validation(_)));
        assert_eq!(err.to_string(), "Please fill out all fields.");
    }

    #[test]
    fn test_validate_drops_blank_thread_id() {
        let mut d = draft("a@b.com", "S", "hello");
        d.thread_id = Some("  ".to_string());
        assert_eq!(d.validate().unwrap().thread_id, None);
    }

    #[test]
    fn test_attach_sets_all_ai_fields() {
        let mut msg = ComposedMessage::new(1, draft("a@b.com", "S", "hello"), Utc::now());
        assert!(!msg.is_analyzed());

        msg.attach(&InferenceResult {
            result: "reply".to_string(),
            trace: Some(serde_json::json!([])),
            request_id: Some("r1".to_string()),
        });

        assert!(msg.is_analyzed());
        assert_eq!(msg.ai_hint.as_deref(), Some("reply"));
        assert_eq!(msg.ai_request_id.as_deref(), Some("r1"));
        assert_eq!(msg.ai_trace, Some(serde_json::json!([])));
    }
}
