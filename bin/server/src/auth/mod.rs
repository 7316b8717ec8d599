//! Authentication routes and session cookies.
//!
//! The hosted identity service owns the session; the server only carries its
//! tokens in http-only cookies:
//! - `/auth/login?next=...` starts the OAuth hand-off and keeps the PKCE
//!   verifier in a short-lived cookie
//! - `/auth/callback?code=...&next=...` exchanges the code and stores tokens
//! - `/auth/logout?next=...` signs out and clears the cookies
//!
//! Sign-ins heading for `/admin` always use the admin gate's designated
//! provider.

pub mod routes;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use labsite_backend::{HostedSessionProvider, SessionTokens};
use time::Duration as TimeDuration;

use crate::config::SessionConfig;

pub use routes::{callback, login, logout};

/// Access-token cookie name.
pub const ACCESS_TOKEN_COOKIE: &str = "sb_access_token";

/// Refresh-token cookie name.
pub const REFRESH_TOKEN_COOKIE: &str = "sb_refresh_token";

/// PKCE verifier cookie name (kept only for the duration of a sign-in).
pub const PKCE_VERIFIER_COOKIE: &str = "sb_pkce_verifier";

/// Where sign-in and sign-out land when no usable `next` is given.
pub const DEFAULT_NEXT: &str = "/portal";

/// Returns `next` if it is a local absolute path, the portal otherwise.
#[must_use]
pub fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => DEFAULT_NEXT.to_string(),
    }
}

/// Whether a path is served by the admin console.
#[must_use]
pub fn is_admin_path(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/") || path.starts_with("/admin?")
}

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: TimeDuration,
    config: &SessionConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").max_age(TimeDuration::ZERO).build()
}

/// Stores the PKCE verifier for the callback.
#[must_use]
pub fn store_verifier(jar: CookieJar, verifier: String, config: &SessionConfig) -> CookieJar {
    jar.add(session_cookie(
        PKCE_VERIFIER_COOKIE,
        verifier,
        TimeDuration::minutes(config.sign_in_minutes),
        config,
    ))
}

/// Stores session tokens and drops the PKCE verifier.
#[must_use]
pub fn store_session(jar: CookieJar, tokens: SessionTokens, config: &SessionConfig) -> CookieJar {
    let jar = jar
        .add(session_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token,
            TimeDuration::minutes(config.access_token_minutes),
            config,
        ))
        .add(expired_cookie(PKCE_VERIFIER_COOKIE));

    match tokens.refresh_token {
        Some(refresh_token) => jar.add(session_cookie(
            REFRESH_TOKEN_COOKIE,
            refresh_token,
            TimeDuration::days(config.refresh_token_days),
            config,
        )),
        None => jar,
    }
}

/// Removes every session cookie.
#[must_use]
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.add(expired_cookie(ACCESS_TOKEN_COOKIE))
        .add(expired_cookie(REFRESH_TOKEN_COOKIE))
}

/// Clears the cookies when the provider no longer holds the session the
/// request arrived with, e.g. after a forced sign-out.
#[must_use]
pub fn sync_session(jar: CookieJar, provider: &HostedSessionProvider) -> CookieJar {
    if provider.tokens().is_none() && jar.get(ACCESS_TOKEN_COOKIE).is_some() {
        clear_session(jar)
    } else {
        jar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_local_path() {
        assert_eq!(sanitize_next(Some("/admin")), "/admin");
        assert_eq!(sanitize_next(Some("/portal?tab=profile")), "/portal?tab=profile");
        assert_eq!(sanitize_next(Some("//evil.example")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("https://evil.example")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("/\\evil.example")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(None), DEFAULT_NEXT);
    }

    #[test]
    fn admin_paths_are_recognized() {
        assert!(is_admin_path("/admin"));
        assert!(is_admin_path("/admin/projects"));
        assert!(!is_admin_path("/administrivia"));
        assert!(!is_admin_path("/portal"));
    }

    #[test]
    fn session_cookies_are_http_only() {
        let config = SessionConfig::default();
        let jar = store_session(
            CookieJar::new(),
            SessionTokens {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
            },
            &config,
        );

        let access = jar.get(ACCESS_TOKEN_COOKIE).expect("access cookie");
        assert_eq!(access.value(), "access");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.max_age(), Some(TimeDuration::minutes(60)));
        assert_eq!(
            jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()),
            Some("refresh".to_string())
        );
    }

    #[test]
    fn clearing_expires_cookies() {
        let jar = clear_session(CookieJar::new());
        let access = jar.get(ACCESS_TOKEN_COOKIE).expect("removal cookie");
        assert_eq!(access.max_age(), Some(TimeDuration::ZERO));
        assert_eq!(access.value(), "");
    }
}
