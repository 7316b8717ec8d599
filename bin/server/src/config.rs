//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables, e.g.
//! `BACKEND__URL`, `BACKEND__ANON_KEY`, `SITE__ORIGIN` or
//! `GATE__RETRY__MAX_RETRIES`.
//!
//! See [`GateConfig`] for gate configuration and [`BackendConfig`] for the
//! hosted backend connection.

use labsite_access::GateConfig;
use labsite_backend::BackendConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Public site settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Admin and member gate configuration.
    #[serde(default)]
    pub gate: GateConfig,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Hosted backend connection.
    pub backend: BackendConfig,
}

/// Where the site is served from.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Public origin used to build post-login return URLs.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Socket address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            bind_addr: default_bind_addr(),
        }
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Lifetime of the access-token cookie, in minutes.
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,

    /// Lifetime of the refresh-token cookie, in days.
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,

    /// Lifetime of the PKCE verifier cookie, in minutes.
    #[serde(default = "default_sign_in_minutes")]
    pub sign_in_minutes: i64,
}

fn default_secure_cookies() -> bool {
    true
}

fn default_access_token_minutes() -> i64 {
    60
}

fn default_refresh_token_days() -> i64 {
    30
}

fn default_sign_in_minutes() -> i64 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secure_cookies: default_secure_cookies(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
            sign_in_minutes: default_sign_in_minutes(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labsite_access::IdentityProvider;

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert!(config.secure_cookies);
        assert_eq!(config.access_token_minutes, 60);
        assert_eq!(config.refresh_token_days, 30);
        assert_eq!(config.sign_in_minutes, 10);
    }

    #[test]
    fn only_backend_is_required() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "backend": { "url": "https://db.lab.edu", "anon_key": "anon" }
        }))
        .expect("valid config");

        assert_eq!(config.site.origin, "http://localhost:3000");
        assert_eq!(
            config.gate.designated_provider(),
            &IdentityProvider::Google
        );
        assert_eq!(config.backend.request_timeout_secs, 10);
    }
}
