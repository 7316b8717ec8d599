//! Session resolution and role-gated access for labsite.
//!
//! This crate provides:
//! - The [`SessionProvider`] and [`Directory`] contracts the gates depend on
//! - The admin gate (designated identity provider plus email allowlist)
//! - The member gate (team-directory match with first sign-in linking)
//! - [`SessionContext`], the member portal's view of the resolved session
//! - In-memory collaborators in [`memory`]
//!
//! # State machine
//!
//! Both gates move `Loading → {Unauthenticated, Forbidden, Ready}` and return
//! to `Loading` whenever a session change triggers re-resolution. Only
//! `Ready` carries the protected payload. A directory that cannot be reached
//! never grants access.
//!
//! # Example
//!
//! ```
//! use labsite_access::memory::{InMemoryDirectory, InMemorySessionProvider};
//! use labsite_access::{AdminGate, AdminProfile, GateConfig, IdentityProvider, Session};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = Arc::new(InMemorySessionProvider::with_session(
//!     Session::new("u1".into(), IdentityProvider::Google).with_email("admin@lab.edu"),
//! ));
//! let directory = Arc::new(
//!     InMemoryDirectory::new().with_admin(AdminProfile::new("admin@lab.edu", "owner")),
//! );
//!
//! let gate = AdminGate::admin(provider, directory, GateConfig::default());
//! assert!(gate.resolve().await.is_ready());
//! # }
//! ```

pub mod admin;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod gate;
pub mod login;
pub mod member;
pub mod memory;
pub mod profile;
pub mod provider;
pub mod session;
pub mod tier;

pub use admin::{AdminAccess, AdminGate, AdminResolver};
pub use config::{GateConfig, GateConfigBuilder, RetryPolicy};
pub use context::SessionContext;
pub use directory::{Directory, normalize_email};
pub use error::{ContextError, DirectoryError, ProviderError};
pub use gate::{ForbiddenReason, Gate, GateState, MountHandle, Notice, Resolver, Verdict};
pub use login::{LoginRecord, redirect_target};
pub use member::{MemberGate, MemberResolver};
pub use profile::{AdminProfile, MemberProfile};
pub use provider::{
    AuthEvent, AuthListener, ListenerRegistry, SessionProvider, SignInRedirect, Subscription,
};
pub use session::{IdentityProvider, ProfileMetadata, Session, SubjectId};
pub use tier::ActorTier;
