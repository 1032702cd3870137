//! Error types for the inference layer.

use thiserror::Error;

/// Errors that can occur while talking to an inference service.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Failed to build the HTTP client.
    #[error("failed to create client: {0}")]
    ClientCreate(String),

    /// The request could not be delivered (connection, timeout).
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The service answered with a non-success status.
    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid request parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The service returned a different number of completions than inputs.
    #[error("expected {expected} completions, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}
