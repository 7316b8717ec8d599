//! Hosted backend integration for labsite.
//!
//! Implements the [`labsite_access::SessionProvider`] and
//! [`labsite_access::Directory`] contracts against a hosted
//! backend-as-a-service: OAuth sign-in with PKCE through its auth API, and
//! the `admin_users` and `team_members` tables through its REST API.

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod provider;
pub mod types;

pub use client::{BackendClient, Filter};
pub use config::BackendConfig;
pub use directory::{ADMIN_TABLE, HostedDirectory, MEMBER_TABLE};
pub use error::BackendError;
pub use provider::{HostedSessionProvider, SessionTokens};
