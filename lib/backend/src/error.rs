//! Hosted backend error types.

use std::fmt;

/// Errors talking to the hosted backend.
#[derive(Debug)]
pub enum BackendError {
    /// The configured base URL or a derived endpoint is not a valid URL.
    InvalidUrl {
        /// Error details.
        details: String,
    },
    /// The request never got a response.
    ConnectionFailed {
        /// Error details.
        details: String,
    },
    /// The backend answered with a non-success status.
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        details: String,
    },
    /// The response body could not be decoded.
    InvalidResponse {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { details } => write!(f, "invalid backend URL: {details}"),
            Self::ConnectionFailed { details } => {
                write!(f, "failed to reach backend: {details}")
            }
            Self::RequestFailed { status, details } => {
                write!(f, "backend request failed with status {status}: {details}")
            }
            Self::InvalidResponse { details } => {
                write!(f, "invalid backend response: {details}")
            }
        }
    }
}

impl std::error::Error for BackendError {}
