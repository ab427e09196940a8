//! Per-session message records
//!
//! Records are kept in append order and never reordered; the inbox view
//! walks them newest-first. AI fields are attached in place once the
//! assistant call for a record completes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ComposedMessage, InferenceResult, MessageDraft};
use crate::MockMailError;

#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    records: Vec<ComposedMessage>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create a record from a validated draft and append it.
    ///
    /// The id is the creation time in milliseconds, bumped past the last id
    /// when two records land in the same millisecond.
    pub fn compose(&mut self, draft: MessageDraft, now: DateTime<Utc>) -> &ComposedMessage {
        let mut id = now.timestamp_millis();
        if let Some(last) = self.records.last() {
            id = id.max(last.id + 1);
        }
        self.append(ComposedMessage::new(id, draft, now))
    }

    pub fn append(&mut self, record: ComposedMessage) -> &ComposedMessage {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn get(&self, id: i64) -> Option<&ComposedMessage> {
        self.records.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: i64) -> Result<&mut ComposedMessage, MockMailError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(MockMailError::MessageNotFound(id))
    }

    pub fn attach_ai_fields(
        &mut self,
        id: i64,
        result: &InferenceResult,
    ) -> Result<&ComposedMessage, MockMailError> {
        let record = self.get_mut(id)?;
        record.attach(result);
        Ok(record)
    }

    pub fn mark_read(&mut self, id: i64) -> Result<&ComposedMessage, MockMailError> {
        let record = self.get_mut(id)?;
        record.read = true;
        Ok(record)
    }

    /// Newest record first. Each call walks the current snapshot again.
    pub fn list_newest_first(&self) -> impl DoubleEndedIterator<Item = &ComposedMessage> + Clone {
        self.records.iter().rev()
    }
}

/// Everything one user session owns.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub store: SessionStore,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            store: SessionStore::new(),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
