//! Error types for the access crate.
//!
//! Errors are carried in rootcause reports:
//! - `ProviderError`: the session provider could not complete a call
//! - `DirectoryError`: a directory lookup or write could not be completed
//! - `ContextError`: session context requested outside a ready member gate
//!
//! A directory `Err` always means "could not verify", never "not found".
//! Not-found is `Ok(None)`.

use std::fmt;

/// Errors from the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached.
    Unavailable { reason: String },
    /// The provider rejected the session token.
    InvalidSession { reason: String },
    /// Starting the OAuth hand-off failed.
    SignInFailed { provider: String, reason: String },
    /// Clearing the session failed.
    SignOutFailed { reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => {
                write!(f, "session provider unavailable: {reason}")
            }
            Self::InvalidSession { reason } => {
                write!(f, "invalid session: {reason}")
            }
            Self::SignInFailed { provider, reason } => {
                write!(f, "sign-in with '{provider}' failed: {reason}")
            }
            Self::SignOutFailed { reason } => {
                write!(f, "sign-out failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from directory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The directory backend could not be reached or answered with an error.
    Unavailable { operation: String, reason: String },
    /// The backend answered with data that could not be understood.
    InvalidRecord { operation: String, reason: String },
    /// A write targeted a record that does not exist.
    RecordMissing { record: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { operation, reason } => {
                write!(f, "directory unavailable during {operation}: {reason}")
            }
            Self::InvalidRecord { operation, reason } => {
                write!(f, "invalid directory record from {operation}: {reason}")
            }
            Self::RecordMissing { record } => {
                write!(f, "directory record {record} does not exist")
            }
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Misuse of the session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// Session data was requested while no member gate was ready.
    OutsideGate,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideGate => {
                write!(f, "session context used outside a ready member gate")
            }
        }
    }
}

impl std::error::Error for ContextError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_sign_in_failed_display() {
        let err = ProviderError::SignInFailed {
            provider: "google".to_string(),
            reason: "popup closed".to_string(),
        };
        assert!(err.to_string().contains("google"));
        assert!(err.to_string().contains("popup closed"));
    }

    #[test]
    fn directory_unavailable_display() {
        let err = DirectoryError::Unavailable {
            operation: "find_admin_by_email".to_string(),
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("find_admin_by_email"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn context_outside_gate_display() {
        assert!(ContextError::OutsideGate.to_string().contains("outside"));
    }
}
