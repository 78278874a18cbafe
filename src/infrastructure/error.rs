use thiserror::Error;

use crate::domain::models::SessionStep;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Plan parse error: {0}")]
    Parse(String),
    #[error("Schedule entry {index} cannot be mapped: {reason}")]
    Mapping { index: usize, reason: String },
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Credential storage error: {0}")]
    Credential(String),
    #[error("Calendar API error: {0}")]
    Calendar(String),
    #[error("Plan generator error: {0}")]
    Generator(String),
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("Operation '{operation}' is not allowed in step '{step}'")]
    State {
        operation: String,
        step: SessionStep,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn state(operation: &str, step: SessionStep) -> Self {
        CoreError::State {
            operation: operation.to_string(),
            step,
        }
    }
}
