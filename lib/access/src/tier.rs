//! Actor tiers derived from a session and the directory.
//!
//! A tier is never stored. It is recomputed whenever the session changes by
//! cross-referencing the session against the admin allowlist or the member
//! directory.

use serde::{Deserialize, Serialize};

/// The authorization tier of the current actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorTier {
    /// No session.
    Anonymous,
    /// Session whose email is on the admin allowlist.
    Admin,
    /// Session matched to a team-member record.
    Member,
    /// Session with no matching directory record, or one that could not be
    /// verified.
    Denied,
}

impl ActorTier {
    /// Returns true if the actor may see protected content.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Admin | Self::Member)
    }

    /// Returns true for the admin tier.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns true if a session is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_and_member_are_authorized() {
        assert!(ActorTier::Admin.is_authorized());
        assert!(ActorTier::Member.is_authorized());
        assert!(!ActorTier::Denied.is_authorized());
        assert!(!ActorTier::Anonymous.is_authorized());
    }

    #[test]
    fn denied_is_still_authenticated() {
        assert!(ActorTier::Denied.is_authenticated());
        assert!(!ActorTier::Anonymous.is_authenticated());
        assert!(!ActorTier::Member.is_admin());
    }

    #[test]
    fn tier_serialization_format() {
        let json = serde_json::to_string(&ActorTier::Member).expect("serialize");
        assert_eq!(json, "\"member\"");
    }
}
