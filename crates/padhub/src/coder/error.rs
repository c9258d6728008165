//! Coder client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for Coder operations.
pub type CoderResult<T> = Result<T, CoderError>;

/// Errors that can occur while talking to the Coder deployment.
#[derive(Debug, Error)]
pub enum CoderError {
    /// HTTP request failed at the transport level.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Coder returned a non-success response.
    #[error("Coder API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    /// A required configuration value is absent.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// No unique username could be derived within the attempt bound.
    #[error("failed to find a unique username for {email} after {attempts} attempts")]
    UsernameExhausted { email: String, attempts: u32 },
}
