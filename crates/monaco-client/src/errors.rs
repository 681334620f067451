//! Client error types
//!
//! Errors fall into two kinds the deploy layer cares about: *logical*
//! rejections (4xx with a body, bad payloads) bound to one configuration and
//! never retried, and *transport* failures (network errors, retryable server
//! responses that stayed broken after backoff).

use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure, including request timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request; never retried
    #[error("API error: {status} - {message}{}", correlation_suffix(.correlation_id))]
    Api {
        status: u16,
        message: String,
        correlation_id: Option<String>,
    },

    /// A retryable server response (429, 5xx) survived every retry
    #[error("request to {url} failed after {attempts} attempts: {status} - {message}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        status: u16,
        message: String,
    },

    /// Response body did not parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// OAuth token acquisition failed; aborts the whole run
    #[error("OAuth token request failed: {0}")]
    OAuth(String),

    #[error("unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },
}

impl ClientError {
    /// True for per-configuration rejections that retrying cannot fix.
    pub fn is_logical(&self) -> bool {
        match self {
            ClientError::Api { .. }
            | ClientError::Json(_)
            | ClientError::UnexpectedResponse { .. } => true,
            ClientError::Http(e) => e.is_timeout(),
            ClientError::RetriesExhausted { .. } | ClientError::OAuth(_) => false,
        }
    }

    /// HTTP status of the failure, where one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } | ClientError::RetriesExhausted { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

fn correlation_suffix(correlation_id: &Option<String>) -> String {
    match correlation_id {
        Some(id) => format!(" (correlation id {id})"),
        None => String::new(),
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
