pub mod assistant;
pub mod config;
pub mod error;
pub mod inference;
pub mod logs;
pub mod models;
pub mod session;
pub mod trace;

pub use assistant::{Assistant, MessageView, Suggestion};
pub use config::MockMailConfig;
pub use error::MockMailError;
pub use inference::{HttpInferenceClient, InferenceBackend, InferenceError, ERROR_PREFIX};
pub use logs::{FilterStrategy, HttpLogStore, LogCorrelator, LogQuery, LogStore, LogStoreError};
pub use models::{ComposedMessage, InferenceResult, LogEvent, MessageDraft};
pub use session::{SessionContext, SessionStore};
pub use trace::{extract_fields, TraceFieldTable, TraceShape, DEFAULT_TARGET_NODE, NODE_INPUT_TRACE};
