//! The access gate state machine.
//!
//! A [`Gate`] resolves the current session against a [`Resolver`] and
//! publishes the outcome as a [`GateState`]. The admin and member variants
//! differ only in their resolver; sequencing, forced sign-out and teardown
//! live here.
//!
//! Every resolution takes a fresh sequence number. A result is applied only
//! while its number is still the latest and the gate has not been torn down,
//! so an old resolution finishing late can never overwrite a newer one.

use async_trait::async_trait;
use rootcause::Report;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::login::redirect_target;
use crate::provider::{AuthEvent, SessionProvider, SignInRedirect, Subscription};
use crate::session::{IdentityProvider, Session};
use crate::tier::ActorTier;

/// Observable state of a gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateState<R> {
    Loading,
    Unauthenticated { notice: Option<Notice> },
    Forbidden { reason: ForbiddenReason },
    Ready(R),
}

impl<R> GateState<R> {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the protected payload when ready.
    #[must_use]
    pub fn ready(&self) -> Option<&R> {
        match self {
            Self::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
            Self::Ready(_) => "ready",
        }
    }
}

/// User-visible notice shown alongside the sign-in view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The session came from a provider other than the one the gate accepts.
    WrongProvider {
        required: IdentityProvider,
        used: IdentityProvider,
    },
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::WrongProvider { required, used } => format!(
                "Admin access requires signing in with {}. You signed in with {}, so you have been signed out.",
                required.label(),
                used.label()
            ),
        }
    }
}

/// Why a signed-in user was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForbiddenReason {
    /// The email is not on the admin allowlist.
    NotAllowlisted,
    /// No team-member record matches the subject or the email.
    NotInDirectory,
    /// The directory could not be reached, so nothing could be verified.
    Unverified,
    /// The session carries no email to check.
    MissingEmail,
}

impl ForbiddenReason {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotAllowlisted => {
                "This account is not authorized for admin access. Sign in with a different account."
            }
            Self::NotInDirectory => {
                "Your account isn't in the team directory yet. Ask a lab admin to add your email, then sign in again."
            }
            Self::Unverified => {
                "We couldn't verify your access right now. Please try again in a moment."
            }
            Self::MissingEmail => {
                "Your sign-in did not share an email address, so access could not be checked."
            }
        }
    }

    /// Whether the user can fix this by being added to a directory.
    #[must_use]
    pub fn is_request_access(&self) -> bool {
        matches!(self, Self::NotInDirectory)
    }
}

/// What a resolver concluded for a present session.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<R> {
    /// Grant access with this payload.
    Ready(R),
    /// Deny, clearing the session at the provider first.
    SignOut(GateState<R>),
    /// Settle in this state without touching the session.
    Settle(GateState<R>),
}

/// Variant-specific resolution of a present session.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Payload exposed once ready.
    type Ready: Clone + Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Tier granted by `Ready`.
    fn tier(&self) -> ActorTier;

    /// The only provider this gate accepts, if restricted.
    fn designated_provider(&self) -> Option<&IdentityProvider> {
        None
    }

    async fn resolve(&self, session: Session) -> Verdict<Self::Ready>;

    /// Called once a `Ready` result has been applied.
    fn on_ready(&self, _ready: &Self::Ready) {}
}

/// A role gate over a session provider.
///
/// Cloning is cheap; clones share state.
pub struct Gate<R: Resolver> {
    inner: Arc<GateInner<R>>,
}

struct GateInner<R: Resolver> {
    provider: Arc<dyn SessionProvider>,
    resolver: R,
    state: watch::Sender<GateState<R::Ready>>,
    sequence: AtomicU64,
    mounted: AtomicBool,
    torn_down: AtomicBool,
    absorbed_sign_outs: AtomicUsize,
}

impl<R: Resolver> Clone for Gate<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resolver> Gate<R> {
    /// Creates a gate in the `Loading` state.
    pub fn new(provider: Arc<dyn SessionProvider>, resolver: R) -> Self {
        let (state, _) = watch::channel(GateState::Loading);
        Self {
            inner: Arc::new(GateInner {
                provider,
                resolver,
                state,
                sequence: AtomicU64::new(0),
                mounted: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
                absorbed_sign_outs: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> GateState<R::Ready> {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GateState<R::Ready>> {
        self.inner.state.subscribe()
    }

    /// The tier of the current actor, or `None` while loading.
    #[must_use]
    pub fn tier(&self) -> Option<ActorTier> {
        match &*self.inner.state.borrow() {
            GateState::Loading => None,
            GateState::Unauthenticated { .. } => Some(ActorTier::Anonymous),
            GateState::Forbidden { .. } => Some(ActorTier::Denied),
            GateState::Ready(_) => Some(self.inner.resolver.tier()),
        }
    }

    /// Runs one resolution and returns what it concluded.
    ///
    /// The result is published only if no newer resolution started meanwhile
    /// and the gate was not torn down. A forced sign-out that completes after
    /// a newer resolution started may have cleared the session that one saw,
    /// so the gate resolves again.
    pub async fn resolve(&self) -> GateState<R::Ready> {
        let inner = &self.inner;
        let gate = inner.resolver.name();
        loop {
            let seq = inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            if !inner.torn_down.load(Ordering::SeqCst) {
                inner.state.send_replace(GateState::Loading);
            }

            let session = match inner.provider.get_session().await {
                Ok(session) => session,
                Err(err) => {
                    warn!(gate, error = %err, "session lookup failed, treating as signed out");
                    None
                }
            };

            let state = match session {
                None => GateState::Unauthenticated { notice: None },
                Some(session) => match inner.resolver.resolve(session).await {
                    Verdict::Ready(ready) => GateState::Ready(ready),
                    Verdict::Settle(state) => state,
                    Verdict::SignOut(state) => {
                        if !self.is_current(seq) {
                            debug!(gate, seq, "skipping sign-out for superseded resolution");
                        } else if self.force_sign_out().await
                            && !self.is_current(seq)
                            && !inner.torn_down.load(Ordering::SeqCst)
                        {
                            info!(gate, seq, "sign-out outlived its resolution, resolving again");
                            continue;
                        }
                        state
                    }
                },
            };

            if self.apply(seq, state.clone())
                && let GateState::Ready(ready) = &state
            {
                inner.resolver.on_ready(ready);
            }
            return state;
        }
    }

    /// Starts the OAuth hand-off, returning to `origin` + `path`.
    ///
    /// A gate with a designated provider always uses it.
    pub async fn sign_in(
        &self,
        origin: &str,
        path: &str,
        requested: Option<&IdentityProvider>,
    ) -> Result<SignInRedirect, Report<ProviderError>> {
        let provider = self
            .inner
            .resolver
            .designated_provider()
            .or(requested)
            .cloned()
            .unwrap_or_default();
        let redirect_to = redirect_target(origin, path);
        info!(
            gate = self.inner.resolver.name(),
            provider = %provider,
            redirect_to,
            "starting sign-in"
        );
        self.inner
            .provider
            .sign_in_with_provider(&provider, &redirect_to)
            .await
    }

    /// Clears the session and returns to `Unauthenticated`.
    ///
    /// Any resolution still in flight is superseded.
    pub async fn sign_out(&self) -> Result<(), Report<ProviderError>> {
        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let absorbed = self.absorb_next_sign_out();
        if let Err(err) = self.inner.provider.sign_out().await {
            if absorbed {
                self.release_absorbed();
            }
            return Err(err);
        }
        self.apply(seq, GateState::Unauthenticated { notice: None });
        Ok(())
    }

    /// Subscribes to session changes and resolves on mount and after every
    /// change until the returned handle is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(&self) -> MountHandle<R> {
        let inner = &self.inner;
        inner.torn_down.store(false, Ordering::SeqCst);
        inner.mounted.store(true, Ordering::SeqCst);

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let subscription = inner.provider.on_auth_change(Arc::new(move |event| {
            let _ = events_tx.send(event);
        }));

        let gate = self.clone();
        let task = tokio::spawn(async move {
            let name = gate.inner.resolver.name();
            let mut resolutions = JoinSet::new();
            resolutions.spawn(resolve_owned(gate.clone()));

            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        if !gate.should_resolve(event) {
                            debug!(gate = name, ?event, "ignoring session event");
                            continue;
                        }
                        debug!(gate = name, ?event, "session changed, resolving");
                        resolutions.spawn(resolve_owned(gate.clone()));
                    }
                    Some(_) = resolutions.join_next(), if !resolutions.is_empty() => {}
                }
            }
        });

        info!(gate = inner.resolver.name(), "gate mounted");
        MountHandle {
            gate: self.clone(),
            subscription: Some(subscription),
            task,
        }
    }

    fn is_current(&self, seq: u64) -> bool {
        self.inner.sequence.load(Ordering::SeqCst) == seq
    }

    fn apply(&self, seq: u64, state: GateState<R::Ready>) -> bool {
        let inner = &self.inner;
        let gate = inner.resolver.name();
        if inner.torn_down.load(Ordering::SeqCst) {
            debug!(gate, seq, "gate torn down, dropping result");
            return false;
        }
        if !self.is_current(seq) {
            debug!(gate, seq, "stale resolution discarded");
            return false;
        }
        info!(gate, seq, state = state.label(), "gate state changed");
        inner.state.send_replace(state);
        true
    }

    /// Returns whether the provider signed out.
    async fn force_sign_out(&self) -> bool {
        let absorbed = self.absorb_next_sign_out();
        match self.inner.provider.sign_out().await {
            Ok(()) => true,
            Err(err) => {
                if absorbed {
                    self.release_absorbed();
                }
                warn!(gate = self.inner.resolver.name(), error = %err, "forced sign-out failed");
                false
            }
        }
    }

    fn absorb_next_sign_out(&self) -> bool {
        if self.inner.mounted.load(Ordering::SeqCst) {
            self.inner.absorbed_sign_outs.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn release_absorbed(&self) {
        let _ = self.inner.absorbed_sign_outs.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |count| count.checked_sub(1),
        );
    }

    fn should_resolve(&self, event: AuthEvent) -> bool {
        match event {
            AuthEvent::SignedOut => self
                .inner
                .absorbed_sign_outs
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                    count.checked_sub(1)
                })
                .is_err(),
            AuthEvent::SignedIn | AuthEvent::UserUpdated => true,
            AuthEvent::TokenRefreshed => false,
        }
    }

    fn teardown(&self) {
        let inner = &self.inner;
        inner.torn_down.store(true, Ordering::SeqCst);
        inner.mounted.store(false, Ordering::SeqCst);
        inner.sequence.fetch_add(1, Ordering::SeqCst);
        inner.absorbed_sign_outs.store(0, Ordering::SeqCst);
        info!(gate = inner.resolver.name(), "gate unmounted");
    }
}

async fn resolve_owned<R: Resolver>(gate: Gate<R>) {
    gate.resolve().await;
}

impl<R: Resolver> fmt::Debug for Gate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("gate", &self.inner.resolver.name())
            .field("state", &self.inner.state.borrow().label())
            .field("sequence", &self.inner.sequence.load(Ordering::SeqCst))
            .finish()
    }
}

/// A mounted gate.
///
/// Dropping the handle unsubscribes from the provider, stops the event loop
/// and guarantees no further state is applied.
#[must_use = "dropping the handle unmounts the gate"]
pub struct MountHandle<R: Resolver> {
    gate: Gate<R>,
    subscription: Option<Subscription>,
    task: JoinHandle<()>,
}

impl<R: Resolver> MountHandle<R> {
    #[must_use]
    pub fn gate(&self) -> &Gate<R> {
        &self.gate
    }

    /// Unmounts now.
    pub fn unmount(self) {}
}

impl<R: Resolver> Drop for MountHandle<R> {
    fn drop(&mut self) {
        self.gate.teardown();
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.task.abort();
    }
}

impl<R: Resolver> fmt::Debug for MountHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
