//! labsite web server.
//!
//! Serves the admin console and the member portal. Both pages are rendered
//! on the server after the matching gate has resolved the request's session.

#![allow(non_snake_case)]

pub mod auth;
pub mod components;
pub mod config;
pub mod error;
pub mod pages;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::home_page))
        .route("/admin", get(pages::admin_page))
        .route("/portal", get(pages::portal_page))
        .route("/portal/refresh", post(pages::refresh_profile))
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "site": { "origin": "https://lab.edu" },
            "backend": { "url": "https://db.lab.edu", "anon_key": "anon" }
        }))
        .expect("valid config");
        Arc::new(AppState::new(config).expect("valid backend url"))
    }

    #[tokio::test]
    async fn admin_without_session_shows_sign_in() {
        let response = router(test_state())
            .oneshot(Request::get("/admin").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Admin sign-in"));
    }

    #[tokio::test]
    async fn login_redirects_to_identity_service() {
        let response = router(test_state())
            .oneshot(
                Request::get("/auth/login?next=/admin")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location header");
        assert!(location.starts_with("https://db.lab.edu/auth/v1/authorize?"));
        assert!(location.contains("provider=google"));

        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("sb_pkce_verifier=")));
    }

    #[tokio::test]
    async fn callback_without_verifier_is_rejected() {
        let response = router(test_state())
            .oneshot(
                Request::get("/auth/callback?code=abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
