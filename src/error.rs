use thiserror::Error;

/// Errors surfaced by the AutoGuard client and pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AutoGuardError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Analysis {analysis_id} still processing after {attempts} polls")]
    PollTimeout { analysis_id: String, attempts: u32 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AutoGuardError {
    /// Map a non-success HTTP status and its server message onto the taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => AutoGuardError::NotFound(message),
            409 => AutoGuardError::Conflict(message),
            400 | 422 => AutoGuardError::Validation(message),
            401 | 403 => AutoGuardError::Unauthorized(message),
            _ => AutoGuardError::Server { status, message },
        }
    }

    /// Transport failures are the only errors worth an explicit user retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AutoGuardError::Network(_))
    }
}

impl From<reqwest::Error> for AutoGuardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AutoGuardError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            AutoGuardError::from_status(status.as_u16(), err.to_string())
        } else {
            AutoGuardError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AutoGuardError {
    fn from(err: serde_json::Error) -> Self {
        AutoGuardError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutoGuardError>;
