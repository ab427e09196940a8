//! Session registry - one isolated [`SessionContext`] per UI session.

use std::collections::HashMap;
use std::sync::Arc;

use mockmail_core::{MockMailError, SessionContext};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<SessionContext>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let ctx = SessionContext::new();
        let id = ctx.id;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(ctx)));
        tracing::info!(session_id = %id, "Session created");
        id
    }

    pub async fn get(&self, id: &str) -> Result<SharedSession, MockMailError> {
        let not_found = || MockMailError::SessionNotFound(id.to_string());
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.sessions
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(not_found)
    }

    /// Drop a session and its records. In-flight requests holding the
    /// session keep their handle until they finish.
    pub async fn remove(&self, id: &str) -> Result<(), MockMailError> {
        let not_found = || MockMailError::SessionNotFound(id.to_string());
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.sessions
            .write()
            .await
            .remove(&uuid)
            .ok_or_else(not_found)?;
        tracing::info!(session_id = %uuid, "Session removed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
