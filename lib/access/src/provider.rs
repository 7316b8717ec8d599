//! The session provider capability.
//!
//! The hosted identity service owns the session. Gates receive the provider
//! explicitly as an `Arc<dyn SessionProvider>` instead of reaching for ambient
//! global auth state, which keeps them testable against a fake.

use async_trait::async_trait;
use rootcause::Report;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::error::ProviderError;
use crate::session::{IdentityProvider, Session};

/// Session change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Callback invoked on every session change.
///
/// Listeners run on the notifying task and must not block.
pub type AuthListener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

/// Where to send the browser to start an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRedirect {
    /// Authorization URL at the identity service.
    pub url: String,
    /// PKCE verifier to keep until the callback, when the flow uses one.
    pub pkce_verifier: Option<String>,
}

/// A hosted identity service.
///
/// Implementations must notify listeners with [`AuthEvent::SignedOut`] when
/// `sign_out` succeeds.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the current session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<Session>, Report<ProviderError>>;

    /// Registers a change listener. Dropping or cancelling the returned
    /// subscription unregisters it.
    fn on_auth_change(&self, listener: AuthListener) -> Subscription;

    /// Starts the OAuth hand-off with `provider`, returning to `redirect_to`.
    async fn sign_in_with_provider(
        &self,
        provider: &IdentityProvider,
        redirect_to: &str,
    ) -> Result<SignInRedirect, Report<ProviderError>>;

    /// Clears the current session.
    async fn sign_out(&self) -> Result<(), Report<ProviderError>>;
}

/// Handle for a registered listener.
///
/// The listener stays registered until the handle is cancelled or dropped.
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` exactly once on teardown.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Unregisters the listener now.
    pub fn cancel(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Listener bookkeeping for provider implementations.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Listeners>>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, AuthListener>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&self, listener: AuthListener) -> Subscription {
        let id = {
            let mut listeners = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.insert(id, listener);
            id
        };

        let registry: Weak<Mutex<Listeners>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = registry.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .remove(&id);
            }
        })
    }

    /// Invokes every registered listener with `event`.
    pub fn notify(&self, event: AuthEvent) {
        // Snapshot first so a listener may unsubscribe while being called.
        let listeners: Vec<AuthListener> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Returns true if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> AuthListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn notify_reaches_all_listeners() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _a = registry.subscribe(counting_listener(&counter));
        let _b = registry.subscribe(counting_listener(&counter));

        registry.notify(AuthEvent::SignedIn);

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let subscription = registry.subscribe(counting_listener(&counter));
        assert_eq!(registry.len(), 1);

        drop(subscription);
        registry.notify(AuthEvent::SignedOut);

        assert!(registry.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_unregisters_once() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let keep = registry.subscribe(counting_listener(&counter));
        let cancelled = registry.subscribe(counting_listener(&counter));

        cancelled.cancel();
        registry.notify(AuthEvent::UserUpdated);

        assert_eq!(registry.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(keep);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let subscription = registry.subscribe(counting_listener(&counter));
        drop(registry);
        drop(subscription);
    }
}
