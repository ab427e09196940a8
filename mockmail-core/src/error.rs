use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockMailError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{0}")]
    Validation(String),

    #[error("Message {0} not found")]
    MessageNotFound(i64),

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}
