//! Shared application state and per-request collaborators.

use axum_extra::extract::cookie::CookieJar;
use labsite_access::{AdminGate, Directory, MemberGate, SessionProvider};
use labsite_backend::{
    BackendClient, BackendError, HostedDirectory, HostedSessionProvider, SessionTokens,
};
use rootcause::prelude::Report;
use std::sync::Arc;

use crate::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::config::ServerConfig;

/// Shared application state.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Hosted backend client.
    pub backend: BackendClient,
}

impl AppState {
    /// Creates the application state from configuration.
    pub fn new(config: ServerConfig) -> Result<Self, Report<BackendError>> {
        let backend = BackendClient::new(&config.backend)?;
        Ok(Self { config, backend })
    }

    /// Builds a session provider for the browser session carried by `jar`.
    pub fn provider_for(&self, jar: &CookieJar) -> Arc<HostedSessionProvider> {
        let tokens = jar.get(ACCESS_TOKEN_COOKIE).map(|cookie| SessionTokens {
            access_token: cookie.value().to_string(),
            refresh_token: jar
                .get(REFRESH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string()),
        });
        Arc::new(HostedSessionProvider::with_tokens(
            self.backend.clone(),
            tokens,
        ))
    }

    /// Builds a directory acting on behalf of the browser session.
    pub fn directory_for(&self, provider: &HostedSessionProvider) -> Arc<dyn Directory> {
        let access_token = provider.tokens().map(|tokens| tokens.access_token);
        Arc::new(HostedDirectory::new(self.backend.clone()).with_access_token(access_token))
    }

    /// Builds an admin gate for one request.
    pub fn admin_gate(&self, provider: Arc<HostedSessionProvider>) -> AdminGate {
        let directory = self.directory_for(&provider);
        let provider: Arc<dyn SessionProvider> = provider;
        AdminGate::admin(provider, directory, self.config.gate.clone())
    }

    /// Builds a member gate for one request.
    pub fn member_gate(&self, provider: Arc<HostedSessionProvider>) -> MemberGate {
        let directory = self.directory_for(&provider);
        let provider: Arc<dyn SessionProvider> = provider;
        MemberGate::member(provider, directory, self.config.gate.clone())
    }
}
