//! The admin gate.
//!
//! Admins sign in through the designated provider only and must appear on
//! the admin allowlist. A successful resolution writes a login record in the
//! background.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::directory::{Directory, lookup_with_retry, normalize_email};
use crate::gate::{ForbiddenReason, Gate, GateState, Notice, Resolver, Verdict};
use crate::login::LoginRecord;
use crate::profile::AdminProfile;
use crate::provider::SessionProvider;
use crate::session::{IdentityProvider, Session};
use crate::tier::ActorTier;

/// Gate for the admin console.
pub type AdminGate = Gate<AdminResolver>;

impl AdminGate {
    /// Creates an admin gate.
    pub fn admin(
        provider: Arc<dyn SessionProvider>,
        directory: Arc<dyn Directory>,
        config: GateConfig,
    ) -> Self {
        Gate::new(provider, AdminResolver::new(directory, config))
    }
}

/// What the admin gate exposes once ready.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminAccess {
    session: Session,
    profile: AdminProfile,
}

impl AdminAccess {
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The allowlist entry as it was before this sign-in was recorded.
    #[must_use]
    pub fn profile(&self) -> &AdminProfile {
        &self.profile
    }
}

/// Resolves sessions against the admin allowlist.
pub struct AdminResolver {
    directory: Arc<dyn Directory>,
    config: GateConfig,
}

impl AdminResolver {
    pub fn new(directory: Arc<dyn Directory>, config: GateConfig) -> Self {
        Self { directory, config }
    }
}

#[async_trait]
impl Resolver for AdminResolver {
    type Ready = AdminAccess;

    fn name(&self) -> &'static str {
        "admin"
    }

    fn tier(&self) -> ActorTier {
        ActorTier::Admin
    }

    fn designated_provider(&self) -> Option<&IdentityProvider> {
        Some(self.config.designated_provider())
    }

    async fn resolve(&self, session: Session) -> Verdict<AdminAccess> {
        let required = self.config.designated_provider();
        if session.provider() != required {
            warn!(
                subject = %session.subject(),
                provider = %session.provider(),
                required = %required,
                "admin session from non-designated provider"
            );
            return Verdict::SignOut(GateState::Unauthenticated {
                notice: Some(Notice::WrongProvider {
                    required: required.clone(),
                    used: session.provider().clone(),
                }),
            });
        }

        let Some(email) = session
            .email()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
        else {
            warn!(subject = %session.subject(), "admin session without email");
            return Verdict::SignOut(GateState::Forbidden {
                reason: ForbiddenReason::MissingEmail,
            });
        };

        let directory = &self.directory;
        let lookup_email = email.as_str();
        let found = lookup_with_retry(self.config.retry(), "find_admin_by_email", move || {
            directory.find_admin_by_email(lookup_email)
        })
        .await;

        match found {
            Ok(Some(profile)) => {
                debug!(admin_id = %profile.id(), "admin allowlist match");
                Verdict::Ready(AdminAccess { session, profile })
            }
            Ok(None) => {
                info!(subject = %session.subject(), email = %email, "email not on admin allowlist");
                Verdict::SignOut(GateState::Forbidden {
                    reason: ForbiddenReason::NotAllowlisted,
                })
            }
            Err(err) => {
                warn!(error = %err, "admin allowlist could not be verified");
                Verdict::Settle(GateState::Forbidden {
                    reason: ForbiddenReason::Unverified,
                })
            }
        }
    }

    fn on_ready(&self, access: &AdminAccess) {
        let directory = Arc::clone(&self.directory);
        let email = normalize_email(access.profile.email());
        let record = LoginRecord::from_session(&access.session, &email, Utc::now());

        tokio::spawn(async move {
            match directory.record_admin_login(&email, &record).await {
                Ok(()) => debug!(subject = %record.subject, "admin login recorded"),
                Err(err) => warn!(error = %err, "failed to record admin login"),
            }
        });
    }
}
