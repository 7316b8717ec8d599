//! Error types for server routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Authentication route errors.
#[derive(Debug)]
pub enum AuthError {
    /// The callback arrived without an authorization code.
    MissingCode,
    /// The PKCE verifier cookie is missing or expired.
    MissingVerifier,
    /// The identity service refused to start the sign-in.
    SignIn { details: String },
    /// The code could not be exchanged for a session.
    TokenExchange { details: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => write!(f, "missing authorization code"),
            Self::MissingVerifier => write!(f, "missing sign-in verifier"),
            Self::SignIn { details } => write!(f, "sign-in could not start: {}", details),
            Self::TokenExchange { details } => {
                write!(f, "token exchange failed: {}", details)
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::MissingVerifier => (
                StatusCode::BAD_REQUEST,
                "Sign-in expired, please start again",
            ),
            Self::SignIn { .. } => {
                tracing::error!(error = %self, "sign-in start failed");
                (StatusCode::BAD_GATEWAY, "Sign-in is unavailable right now")
            }
            Self::TokenExchange { .. } => {
                tracing::error!(error = %self, "token exchange failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_verifier_is_a_client_error() {
        let response = AuthError::MissingVerifier.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn exchange_failure_hides_details() {
        let err = AuthError::TokenExchange {
            details: "invalid_grant".to_string(),
        };
        assert_eq!(err.to_string(), "token exchange failed: invalid_grant");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
