//! Session provider backed by the hosted auth endpoints.

use async_trait::async_trait;
use labsite_access::{
    AuthEvent, AuthListener, IdentityProvider, ListenerRegistry, ProviderError, Session,
    SessionProvider, SignInRedirect, Subscription,
};
use oauth2::PkceCodeChallenge;
use rootcause::prelude::Report;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::client::BackendClient;

/// Tokens identifying a hosted session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"[redacted]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// [`SessionProvider`] over the hosted auth API.
///
/// The provider holds the tokens of a single browser session. The server
/// builds one per request from the session cookies.
#[derive(Debug)]
pub struct HostedSessionProvider {
    client: BackendClient,
    tokens: Mutex<Option<SessionTokens>>,
    listeners: ListenerRegistry,
}

impl HostedSessionProvider {
    /// Creates a provider with no session.
    #[must_use]
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            tokens: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Creates a provider for an existing session.
    #[must_use]
    pub fn with_tokens(client: BackendClient, tokens: Option<SessionTokens>) -> Self {
        Self {
            client,
            tokens: Mutex::new(tokens),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Returns the current tokens.
    #[must_use]
    pub fn tokens(&self) -> Option<SessionTokens> {
        self.lock_tokens().clone()
    }

    /// Completes the OAuth callback: exchanges the code and stores the
    /// resulting session.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<SessionTokens, Report<ProviderError>> {
        let response = self
            .client
            .exchange_pkce(code, pkce_verifier)
            .await
            .map_err(|e| ProviderError::SignInFailed {
                provider: "hosted".to_string(),
                reason: e.to_string(),
            })?;

        let tokens = SessionTokens {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        };
        *self.lock_tokens() = Some(tokens.clone());
        if let Some(user) = response.user {
            info!(subject = %user.id, "session established");
        }
        self.listeners.notify(AuthEvent::SignedIn);
        Ok(tokens)
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<SessionTokens>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionProvider for HostedSessionProvider {
    async fn get_session(&self) -> Result<Option<Session>, Report<ProviderError>> {
        let Some(access_token) = self.lock_tokens().as_ref().map(|t| t.access_token.clone())
        else {
            return Ok(None);
        };

        let user = self
            .client
            .get_user(&access_token)
            .await
            .map_err(|e| ProviderError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(user.map(|user| user.into_session()))
    }

    fn on_auth_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn sign_in_with_provider(
        &self,
        provider: &IdentityProvider,
        redirect_to: &str,
    ) -> Result<SignInRedirect, Report<ProviderError>> {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let url = self
            .client
            .authorize_url(provider.as_str(), redirect_to, challenge.as_str())
            .map_err(|e| ProviderError::SignInFailed {
                provider: provider.to_string(),
                reason: e.to_string(),
            })?;

        Ok(SignInRedirect {
            url: url.to_string(),
            pkce_verifier: Some(verifier.secret().clone()),
        })
    }

    async fn sign_out(&self) -> Result<(), Report<ProviderError>> {
        let tokens = self.lock_tokens().take();
        if let Some(tokens) = &tokens
            && let Err(err) = self.client.logout(&tokens.access_token).await
        {
            warn!(error = %err, "sign-out request failed");
            *self.lock_tokens() = Some(tokens.clone());
            return Err(ProviderError::SignOutFailed {
                reason: err.to_string(),
            }
            .into());
        }
        self.listeners.notify(AuthEvent::SignedOut);
        Ok(())
    }
}
