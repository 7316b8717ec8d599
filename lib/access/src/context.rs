//! Session context for what the member gate protects.
//!
//! A [`SessionContext`] can only be built by the member gate once it reaches
//! `Ready`, so holding one is proof that resolution succeeded. Clones share the
//! same member profile.

use rootcause::Report;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::directory::{Directory, normalize_email};
use crate::error::DirectoryError;
use crate::profile::MemberProfile;
use crate::session::Session;

/// The resolved user and member profile.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    user: Session,
    member: watch::Sender<MemberProfile>,
    directory: Arc<dyn Directory>,
}

impl SessionContext {
    pub(crate) fn new(user: Session, member: MemberProfile, directory: Arc<dyn Directory>) -> Self {
        let (member, _) = watch::channel(member);
        Self {
            inner: Arc::new(ContextInner {
                user,
                member,
                directory,
            }),
        }
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn user(&self) -> &Session {
        &self.inner.user
    }

    /// Returns a snapshot of the member profile.
    #[must_use]
    pub fn member(&self) -> MemberProfile {
        self.inner.member.borrow().clone()
    }

    /// Subscribes to member profile replacements.
    #[must_use]
    pub fn watch_member(&self) -> watch::Receiver<MemberProfile> {
        self.inner.member.subscribe()
    }

    /// Re-fetches the member profile and replaces it.
    ///
    /// Issues exactly one directory lookup: by the subject the record is
    /// linked to, by email when it is unlinked. The record may be linked to a
    /// subject other than the signed-in user's. The user identity is never
    /// touched. On failure the current profile is kept.
    pub async fn refresh_member(&self) -> Result<MemberProfile, Report<DirectoryError>> {
        let current = self.member();
        let directory = &self.inner.directory;

        let fetched = match current.subject() {
            Some(linked) => directory.find_member_by_subject(linked).await?,
            None => {
                directory
                    .find_member_by_email(&normalize_email(current.email()))
                    .await?
            }
        };

        let Some(member) = fetched else {
            debug!(member_id = %current.id(), "member record vanished during refresh");
            return Err(DirectoryError::RecordMissing {
                record: current.id().to_string(),
            }
            .into());
        };

        info!(member_id = %member.id(), "member profile refreshed");
        self.inner.member.send_replace(member.clone());
        Ok(member)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("user", &self.inner.user.subject())
            .field("member", &self.inner.member.borrow().id())
            .finish()
    }
}
