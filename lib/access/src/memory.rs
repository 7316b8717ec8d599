//! In-memory session provider and directory.
//!
//! These back the test suites of the gates and of the server views. Both
//! support failure injection. The directory can hold lookups open and the
//! provider can hold sign-outs open, so tests can interleave resolutions
//! deterministically.

use async_trait::async_trait;
use labsite_core::MemberId;
use rootcause::Report;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

use crate::directory::{Directory, normalize_email};
use crate::error::{DirectoryError, ProviderError};
use crate::login::LoginRecord;
use crate::profile::{AdminProfile, MemberProfile};
use crate::provider::{
    AuthEvent, AuthListener, ListenerRegistry, SessionProvider, SignInRedirect, Subscription,
};
use crate::session::{IdentityProvider, Session, SubjectId};

/// A session provider holding at most one session in memory.
#[derive(Debug)]
pub struct InMemorySessionProvider {
    session: Mutex<Option<Session>>,
    listeners: ListenerRegistry,
    authorize_url: String,
    sign_in_requests: Mutex<Vec<(IdentityProvider, String)>>,
    sign_outs: AtomicUsize,
    sign_out_hold: Mutex<Option<Arc<Semaphore>>>,
}

impl InMemorySessionProvider {
    /// Creates a provider with no session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            listeners: ListenerRegistry::new(),
            authorize_url: "memory://authorize".to_string(),
            sign_in_requests: Mutex::new(Vec::new()),
            sign_outs: AtomicUsize::new(0),
            sign_out_hold: Mutex::new(None),
        }
    }

    /// Creates a provider that already holds `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        *lock(&provider.session) = Some(session);
        provider
    }

    /// Simulates the OAuth callback completing: stores the session and
    /// notifies listeners.
    pub fn complete_sign_in(&self, session: Session) {
        *lock(&self.session) = Some(session);
        self.listeners.notify(AuthEvent::SignedIn);
    }

    /// Replaces the session without notifying, as a token refresh in another
    /// tab would.
    pub fn replace_session_silently(&self, session: Option<Session>) {
        *lock(&self.session) = session;
    }

    /// Sign-in hand-offs requested so far.
    #[must_use]
    pub fn sign_in_requests(&self) -> Vec<(IdentityProvider, String)> {
        lock(&self.sign_in_requests).clone()
    }

    /// Number of successful sign-outs.
    #[must_use]
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    /// Holds every subsequent sign-out, before the session is cleared, until
    /// the latch releases it.
    #[must_use]
    pub fn hold_sign_outs(&self) -> CallLatch {
        let permits = Arc::new(Semaphore::new(0));
        *lock(&self.sign_out_hold) = Some(Arc::clone(&permits));
        CallLatch { permits }
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for InMemorySessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionProvider {
    async fn get_session(&self) -> Result<Option<Session>, Report<ProviderError>> {
        Ok(lock(&self.session).clone())
    }

    fn on_auth_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn sign_in_with_provider(
        &self,
        provider: &IdentityProvider,
        redirect_to: &str,
    ) -> Result<SignInRedirect, Report<ProviderError>> {
        lock(&self.sign_in_requests).push((provider.clone(), redirect_to.to_string()));
        Ok(SignInRedirect {
            url: format!(
                "{}?provider={provider}&redirect_to={redirect_to}",
                self.authorize_url
            ),
            pkce_verifier: None,
        })
    }

    async fn sign_out(&self) -> Result<(), Report<ProviderError>> {
        let hold = lock(&self.sign_out_hold).clone();
        if let Some(permits) = hold {
            permits
                .acquire()
                .await
                .map_err(|e| ProviderError::SignOutFailed {
                    reason: e.to_string(),
                })?
                .forget();
        }

        lock(&self.session).take();
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.listeners.notify(AuthEvent::SignedOut);
        Ok(())
    }
}

/// A directory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
    hold: Mutex<Option<Arc<Semaphore>>>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    admins: Vec<AdminProfile>,
    members: Vec<MemberProfile>,
    login_records: Vec<LoginRecord>,
    lookups: BTreeMap<&'static str, usize>,
    links: usize,
    failing_lookups: u32,
    failing_writes: bool,
}

/// Keeps held calls waiting until released.
#[derive(Debug, Clone)]
pub struct CallLatch {
    permits: Arc<Semaphore>,
}

impl CallLatch {
    /// Lets `count` waiting or future calls proceed.
    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an admin allowlist entry.
    #[must_use]
    pub fn with_admin(self, admin: AdminProfile) -> Self {
        self.insert_admin(admin);
        self
    }

    /// Adds a team-member record.
    #[must_use]
    pub fn with_member(self, member: MemberProfile) -> Self {
        self.insert_member(member);
        self
    }

    pub fn insert_admin(&self, admin: AdminProfile) {
        self.state().admins.push(admin);
    }

    pub fn insert_member(&self, member: MemberProfile) {
        self.state().members.push(member);
    }

    /// Replaces the stored member record with the same id.
    pub fn update_member(&self, member: MemberProfile) {
        let mut state = self.state();
        if let Some(stored) = state.members.iter_mut().find(|m| m.id() == member.id()) {
            *stored = member;
        }
    }

    /// Makes the next `count` lookups fail as unverifiable.
    pub fn fail_next_lookups(&self, count: u32) {
        self.state().failing_lookups = count;
    }

    /// Makes every write fail until switched back.
    pub fn fail_writes(&self, failing: bool) {
        self.state().failing_writes = failing;
    }

    /// Holds every subsequent lookup until the latch releases it.
    #[must_use]
    pub fn hold_lookups(&self) -> CallLatch {
        let permits = Arc::new(Semaphore::new(0));
        *lock(&self.hold) = Some(Arc::clone(&permits));
        CallLatch { permits }
    }

    /// Returns the stored member record.
    #[must_use]
    pub fn member(&self, id: MemberId) -> Option<MemberProfile> {
        self.state().members.iter().find(|m| m.id() == id).cloned()
    }

    /// Returns the stored admin entry.
    #[must_use]
    pub fn admin(&self, email: &str) -> Option<AdminProfile> {
        let email = normalize_email(email);
        self.state()
            .admins
            .iter()
            .find(|a| normalize_email(a.email()) == email)
            .cloned()
    }

    /// Login records written so far.
    #[must_use]
    pub fn login_records(&self) -> Vec<LoginRecord> {
        self.state().login_records.clone()
    }

    /// Number of subject links performed.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.state().links
    }

    /// Number of answered calls to the named lookup operation.
    #[must_use]
    pub fn lookup_count(&self, operation: &str) -> usize {
        self.state().lookups.get(operation).copied().unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        lock(&self.state)
    }

    async fn answer(&self, operation: &'static str) -> Result<(), Report<DirectoryError>> {
        let hold = lock(&self.hold).clone();
        if let Some(permits) = hold {
            permits
                .acquire()
                .await
                .map_err(|e| DirectoryError::Unavailable {
                    operation: operation.to_string(),
                    reason: e.to_string(),
                })?
                .forget();
        }

        let mut state = self.state();
        *state.lookups.entry(operation).or_default() += 1;
        if state.failing_lookups > 0 {
            state.failing_lookups -= 1;
            return Err(DirectoryError::Unavailable {
                operation: operation.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_write(&self, operation: &str) -> Result<(), Report<DirectoryError>> {
        if self.state().failing_writes {
            return Err(DirectoryError::Unavailable {
                operation: operation.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_admin_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AdminProfile>, Report<DirectoryError>> {
        self.answer("find_admin_by_email").await?;
        Ok(self.admin(email))
    }

    async fn find_member_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>> {
        self.answer("find_member_by_subject").await?;
        Ok(self
            .state()
            .members
            .iter()
            .find(|m| m.subject() == Some(subject))
            .cloned())
    }

    async fn find_member_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>> {
        self.answer("find_member_by_email").await?;
        let email = normalize_email(email);
        Ok(self
            .state()
            .members
            .iter()
            .find(|m| normalize_email(m.email()) == email)
            .cloned())
    }

    async fn link_member_to_subject(
        &self,
        member_id: MemberId,
        subject: &SubjectId,
    ) -> Result<MemberProfile, Report<DirectoryError>> {
        self.check_write("link_member_to_subject")?;
        let mut state = self.state();
        let Some(member) = state.members.iter_mut().find(|m| m.id() == member_id) else {
            return Err(DirectoryError::RecordMissing {
                record: member_id.to_string(),
            }
            .into());
        };
        member.link(subject.clone());
        let linked = member.clone();
        state.links += 1;
        Ok(linked)
    }

    async fn record_admin_login(
        &self,
        email: &str,
        record: &LoginRecord,
    ) -> Result<(), Report<DirectoryError>> {
        self.check_write("record_admin_login")?;
        let email = normalize_email(email);
        let mut state = self.state();
        let Some(admin) = state
            .admins
            .iter_mut()
            .find(|a| normalize_email(a.email()) == email)
        else {
            return Err(DirectoryError::RecordMissing { record: email }.into());
        };
        admin.apply_login(
            Some(record.display_name.clone()),
            record.avatar_url.clone(),
            record.logged_in_at,
        );
        state.login_records.push(record.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_out_clears_session_and_notifies() {
        let provider = InMemorySessionProvider::with_session(
            Session::new("u1".into(), IdentityProvider::Google).with_email("a@lab.edu"),
        );
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let _subscription = provider.on_auth_change(Arc::new(move |event| {
            if event == AuthEvent::SignedOut {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        provider.sign_out().await.expect("sign out");

        assert!(provider.get_session().await.expect("get").is_none());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(provider.sign_out_count(), 1);
    }

    #[tokio::test]
    async fn member_lookup_by_email_ignores_case() {
        let directory = InMemoryDirectory::new().with_member(MemberProfile::new("Grace@Lab.edu"));
        let found = directory
            .find_member_by_email("grace@lab.edu")
            .await
            .expect("lookup");
        assert!(found.is_some());
        assert_eq!(directory.lookup_count("find_member_by_email"), 1);
    }

    #[tokio::test]
    async fn link_missing_member_fails() {
        let directory = InMemoryDirectory::new();
        let result = directory
            .link_member_to_subject(MemberId::new(), &"u1".into())
            .await;
        assert!(result.is_err());
        assert_eq!(directory.link_count(), 0);
    }

    #[tokio::test]
    async fn held_lookup_waits_for_release() {
        let directory = Arc::new(
            InMemoryDirectory::new().with_admin(AdminProfile::new("admin@lab.edu", "owner")),
        );
        let latch = directory.hold_lookups();

        let pending = tokio::spawn({
            let directory = Arc::clone(&directory);
            async move { directory.find_admin_by_email("admin@lab.edu").await }
        });
        tokio::task::yield_now().await;
        assert_eq!(directory.lookup_count("find_admin_by_email"), 0);

        latch.release(1);
        let found = pending.await.expect("join").expect("lookup");
        assert!(found.is_some());
    }
}
