use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Type '{0}' not found")]
    TypeNotFound(String),

    #[error("Type '{0}' could not be scanned: {1}")]
    ScanFailed(String, String),

    #[error("Validation failed for '{0}.{1}': {2}")]
    ValidationFailed(String, String, String),

    #[error("Service '{0}' not registered")]
    ServiceNotFound(String),

    #[error("Service '{0}' failed to initialize: {1}")]
    ServiceInitFailed(String, String),

    #[error("Vital service '{0}' aborted: {1}")]
    ServiceAborted(String, String),

    #[error("Unknown service command: {0}")]
    UnknownCommand(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
