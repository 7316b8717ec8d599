//! Sign-in hand-off and admin login records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Session, SubjectId};

/// What the admin gate writes against the allowlist entry after a successful
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub subject: SubjectId,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub logged_in_at: DateTime<Utc>,
}

impl LoginRecord {
    /// Builds a record from the session that just resolved.
    ///
    /// The display name falls back from the full-name field to the name field
    /// to the email address.
    #[must_use]
    pub fn from_session(session: &Session, email: &str, at: DateTime<Utc>) -> Self {
        Self {
            subject: session.subject().clone(),
            email: email.to_string(),
            display_name: session.display_name().unwrap_or(email).to_string(),
            avatar_url: session.avatar_url().map(str::to_string),
            logged_in_at: at,
        }
    }
}

/// Builds the post-authentication return URL from the current origin and path.
#[must_use]
pub fn redirect_target(origin: &str, path: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{IdentityProvider, ProfileMetadata};

    #[test]
    fn record_prefers_full_name() {
        let session = Session::new("u1".into(), IdentityProvider::Google)
            .with_email("admin@lab.edu")
            .with_metadata(ProfileMetadata {
                full_name: Some("Ada Admin".to_string()),
                name: Some("ada".to_string()),
                avatar_url: Some("https://img.example/a.png".to_string()),
                ..ProfileMetadata::default()
            });
        let at = Utc::now();

        let record = LoginRecord::from_session(&session, "admin@lab.edu", at);

        assert_eq!(record.subject.as_str(), "u1");
        assert_eq!(record.email, "admin@lab.edu");
        assert_eq!(record.display_name, "Ada Admin");
        assert_eq!(record.avatar_url.as_deref(), Some("https://img.example/a.png"));
        assert_eq!(record.logged_in_at, at);
    }

    #[test]
    fn record_falls_back_to_email() {
        let session = Session::new("u1".into(), IdentityProvider::Google);
        let record = LoginRecord::from_session(&session, "admin@lab.edu", Utc::now());
        assert_eq!(record.display_name, "admin@lab.edu");
        assert!(record.avatar_url.is_none());
    }

    #[test]
    fn redirect_target_joins_origin_and_path() {
        assert_eq!(
            redirect_target("https://lab.edu/", "/admin/projects"),
            "https://lab.edu/admin/projects"
        );
        assert_eq!(
            redirect_target("https://lab.edu", "portal"),
            "https://lab.edu/portal"
        );
    }
}
