//! Authentication routes for login, callback, and logout.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use labsite_access::{IdentityProvider, redirect_target};
use labsite_backend::HostedSessionProvider;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    PKCE_VERIFIER_COOKIE, clear_session, is_admin_path, sanitize_next, store_session,
    store_verifier,
};
use crate::error::AuthError;
use crate::state::AppState;

/// Query parameters for starting a sign-in.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
    provider: Option<String>,
}

/// Query parameters for the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    next: Option<String>,
}

/// Query parameters for signing out.
#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    next: Option<String>,
}

/// Starts the OAuth hand-off through the gate guarding `next`.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let next = sanitize_next(query.next.as_deref());
    let origin = state.config.site.origin.as_str();
    let return_path = callback_path(origin, &next)?;
    let requested = query.provider.map(IdentityProvider::from);

    let provider = state.provider_for(&jar);
    let redirect = if is_admin_path(&next) {
        state
            .admin_gate(provider)
            .sign_in(origin, &return_path, requested.as_ref())
            .await
    } else {
        state
            .member_gate(provider)
            .sign_in(origin, &return_path, requested.as_ref())
            .await
    }
    .map_err(|e| AuthError::SignIn {
        details: e.to_string(),
    })?;

    let jar = match redirect.pkce_verifier {
        Some(verifier) => store_verifier(jar, verifier, &state.config.session),
        None => jar,
    };
    Ok((jar, Redirect::to(&redirect.url)))
}

/// Handles the OAuth callback: exchanges the code and lands on `next`.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let next = sanitize_next(query.next.as_deref());
    let code = query.code.ok_or(AuthError::MissingCode)?;
    let verifier = jar
        .get(PKCE_VERIFIER_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AuthError::MissingVerifier)?;

    let provider = HostedSessionProvider::new(state.backend.clone());
    let tokens = provider
        .exchange_code(&code, &verifier)
        .await
        .map_err(|e| AuthError::TokenExchange {
            details: e.to_string(),
        })?;

    tracing::info!(next = %next, "sign-in completed");
    let jar = store_session(jar, tokens, &state.config.session);
    Ok((jar, Redirect::to(&next)))
}

/// Signs out and clears the session cookies.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let next = sanitize_next(query.next.as_deref());
    let provider = state.provider_for(&jar);

    let result = if is_admin_path(&next) {
        state.admin_gate(provider).sign_out().await
    } else {
        state.member_gate(provider).sign_out().await
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "sign-out failed, clearing cookies anyway");
    }

    (clear_session(jar), Redirect::to(&next))
}

/// Path and query of the callback URL that returns to `next`.
fn callback_path(origin: &str, next: &str) -> Result<String, AuthError> {
    let url = Url::parse_with_params(&redirect_target(origin, "/auth/callback"), &[("next", next)])
        .map_err(|e| AuthError::SignIn {
            details: format!("invalid site origin: {e}"),
        })?;
    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_path_encodes_next() {
        let path = callback_path("https://lab.edu", "/portal?tab=profile").expect("valid origin");
        assert_eq!(path, "/auth/callback?next=%2Fportal%3Ftab%3Dprofile");
    }

    #[test]
    fn callback_path_rejects_bad_origin() {
        assert!(callback_path("not an origin", "/admin").is_err());
    }
}
