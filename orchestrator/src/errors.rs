//! Error types for the deployment orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Errors raised by the hosting provider client.
///
/// The variant is the error's kind; the payload is the provider's own
/// message and is what callers see in an `Outcome`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Decode(String),
}

impl ProviderError {
    /// The provider message carried by this error
    pub fn message(&self) -> &str {
        match self {
            ProviderError::Timeout(m)
            | ProviderError::Transport(m)
            | ProviderError::Unauthorized(m)
            | ProviderError::NotFound(m)
            | ProviderError::Rejected(m)
            | ProviderError::Decode(m) => m,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(format!("Request timeout: {}", err))
        } else if err.is_connect() || err.is_request() {
            ProviderError::Transport(format!("Connection error: {}", err))
        } else if err.is_decode() || err.is_body() {
            ProviderError::Decode(format!("Invalid provider response: {}", err))
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Errors raised by a project store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store data is corrupt: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

impl From<OrchestratorError> for StoreError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::IoError(e) => StoreError::Io(e),
            OrchestratorError::Store(e) => e,
            other => StoreError::Corrupt(other.to_string()),
        }
    }
}
