//! Annotation and entity-linking error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Failure of one annotation call, or of the gateway as a whole.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// The request did not complete within the configured timeout.
    #[error("Annotation timed out: {0}")]
    Timeout(String),

    /// The server answered, but not with a usable parse.
    #[error("Annotation protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The gateway is in its terminal failed state.
    #[error("Annotation service unavailable: {0}")]
    Unavailable(String),

    #[error("Annotation service failed to start: {0}")]
    Startup(String),
}

impl AnnotateError {
    /// Whether this error affects only the call that produced it.
    pub fn is_per_call(&self) -> bool {
        matches!(
            self,
            AnnotateError::Timeout(_) | AnnotateError::Protocol(_) | AnnotateError::Http(_)
        )
    }
}

impl From<reqwest::Error> for AnnotateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnnotateError::Timeout(e.to_string())
        } else if e.is_decode() {
            AnnotateError::Protocol(e.to_string())
        } else {
            AnnotateError::Http(e.to_string())
        }
    }
}

/// Failure to obtain entities for a document.
#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("Entity linker request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("Entity linker at {endpoint} returned an unreadable response: {reason}")]
    Response { endpoint: String, reason: String },

    #[error("No entity linker endpoints configured")]
    NoEndpoints,
}
