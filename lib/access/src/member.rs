//! The member gate.
//!
//! Any identity provider is accepted. The session is matched to a team-member
//! record by subject first and by email second; an email match that has never
//! been claimed gets linked to the subject on the way through.

use async_trait::async_trait;
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::context::SessionContext;
use crate::directory::{Directory, lookup_with_retry, normalize_email};
use crate::error::{ContextError, DirectoryError};
use crate::gate::{ForbiddenReason, Gate, GateState, Resolver, Verdict};
use crate::profile::MemberProfile;
use crate::provider::SessionProvider;
use crate::session::{Session, SubjectId};
use crate::tier::ActorTier;

/// Gate for the member portal.
pub type MemberGate = Gate<MemberResolver>;

impl MemberGate {
    /// Creates a member gate.
    pub fn member(
        provider: Arc<dyn SessionProvider>,
        directory: Arc<dyn Directory>,
        config: GateConfig,
    ) -> Self {
        Gate::new(provider, MemberResolver::new(directory, config))
    }

    /// Returns the session context while the gate is ready.
    pub fn context(&self) -> Result<SessionContext, Report<ContextError>> {
        self.state()
            .ready()
            .cloned()
            .ok_or_else(|| ContextError::OutsideGate.into())
    }
}

/// Resolves sessions against the team directory.
pub struct MemberResolver {
    directory: Arc<dyn Directory>,
    config: GateConfig,
}

impl MemberResolver {
    pub fn new(directory: Arc<dyn Directory>, config: GateConfig) -> Self {
        Self { directory, config }
    }

    async fn find_member(
        &self,
        session: &Session,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>> {
        let directory = &self.directory;
        let retry = self.config.retry();
        let subject = session.subject();

        let by_subject = lookup_with_retry(retry, "find_member_by_subject", move || {
            directory.find_member_by_subject(subject)
        })
        .await?;
        if let Some(member) = by_subject {
            debug!(member_id = %member.id(), "member matched by subject");
            return Ok(Some(member));
        }

        let Some(email) = session
            .email()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
        else {
            return Ok(None);
        };
        let lookup_email = email.as_str();
        let by_email = lookup_with_retry(retry, "find_member_by_email", move || {
            directory.find_member_by_email(lookup_email)
        })
        .await?;
        let Some(member) = by_email else {
            return Ok(None);
        };

        match member.subject() {
            None => Ok(Some(self.link(member, subject).await)),
            Some(linked) => {
                warn!(
                    member_id = %member.id(),
                    linked = %linked,
                    subject = %subject,
                    "member record matched by email is linked to another subject"
                );
                Ok(Some(member))
            }
        }
    }

    async fn link(&self, member: MemberProfile, subject: &SubjectId) -> MemberProfile {
        match self
            .directory
            .link_member_to_subject(member.id(), subject)
            .await
        {
            Ok(linked) => {
                info!(member_id = %linked.id(), subject = %subject, "linked member record to subject");
                linked
            }
            Err(err) => {
                warn!(
                    member_id = %member.id(),
                    error = %err,
                    "failed to link member record, continuing unlinked"
                );
                member
            }
        }
    }
}

#[async_trait]
impl Resolver for MemberResolver {
    type Ready = SessionContext;

    fn name(&self) -> &'static str {
        "member"
    }

    fn tier(&self) -> ActorTier {
        ActorTier::Member
    }

    async fn resolve(&self, session: Session) -> Verdict<SessionContext> {
        match self.find_member(&session).await {
            Ok(Some(member)) => Verdict::Ready(SessionContext::new(
                session,
                member,
                Arc::clone(&self.directory),
            )),
            Ok(None) => {
                info!(subject = %session.subject(), "no team directory record for session");
                Verdict::SignOut(GateState::Forbidden {
                    reason: ForbiddenReason::NotInDirectory,
                })
            }
            Err(err) => {
                warn!(error = %err, "team directory could not be verified");
                Verdict::Settle(GateState::Forbidden {
                    reason: ForbiddenReason::Unverified,
                })
            }
        }
    }
}
