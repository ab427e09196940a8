pub mod inference;
pub mod log_event;
pub mod message;

pub use inference::InferenceResult;
pub use log_event::LogEvent;
pub use message::{ComposedMessage, MessageDraft};
