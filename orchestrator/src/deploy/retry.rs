//! Retry classification and budget

use crate::errors::ProviderError;

/// Message fragments that mark a failure as transient
const TRANSIENT_INDICATORS: &[&str] = &[
    "timeout",
    "timed out",
    "etimedout",
    "econnreset",
    "econnrefused",
    "connection reset",
    "connection refused",
    "connection error",
    "socket hang up",
    "network error",
    "bad gateway",
    "service unavailable",
    "temporarily unavailable",
];

/// Classify a provider error as retryable.
///
/// Unrecognised errors are terminal.
pub fn classify(error: &ProviderError) -> bool {
    match error {
        ProviderError::Timeout(_) | ProviderError::Transport(_) => true,
        ProviderError::Unauthorized(_) | ProviderError::NotFound(_) | ProviderError::Decode(_) => {
            false
        }
        ProviderError::Rejected(message) => is_transient_message(message),
    }
}

/// Classify a bare failure message, e.g. a remote build error
pub fn is_transient_message(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_INDICATORS
        .iter()
        .any(|indicator| message.contains(indicator))
}

/// Bounded retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Whether a failure seen after `attempt` resubmissions gets another one
    pub fn should_retry(&self, retryable: bool, attempt: u32) -> bool {
        retryable && attempt < self.max_retries
    }
}
