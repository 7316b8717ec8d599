//! Wire types for the hosted backend's REST and auth endpoints.

use chrono::{DateTime, Utc};
use labsite_access::{
    AdminProfile, IdentityProvider, LoginRecord, MemberProfile, ProfileMetadata, Session,
    SubjectId,
};
use labsite_core::{AdminId, MemberId};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A row of the `admin_users` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminUserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

impl AdminUserRow {
    /// Converts the row into a domain profile.
    pub fn into_profile(self) -> Result<AdminProfile, Report<BackendError>> {
        let id: AdminId = self
            .id
            .parse()
            .map_err(|e: labsite_core::ParseIdError| BackendError::InvalidResponse {
                details: e.to_string(),
            })?;
        Ok(AdminProfile::with_all_fields(
            id,
            self.email,
            self.name,
            self.avatar_url,
            self.role.unwrap_or_else(|| "admin".to_string()),
            self.last_login,
        ))
    }
}

/// A row of the `team_members` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamMemberRow {
    pub id: String,
    pub email: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMemberRow {
    /// Converts the row into a domain profile.
    pub fn into_profile(self) -> Result<MemberProfile, Report<BackendError>> {
        let id: MemberId = self
            .id
            .parse()
            .map_err(|e: labsite_core::ParseIdError| BackendError::InvalidResponse {
                details: e.to_string(),
            })?;
        Ok(MemberProfile::with_all_fields(
            id,
            self.email,
            self.user_id.map(SubjectId::from),
            self.name,
            self.title,
            self.avatar_url,
            self.updated_at,
        ))
    }
}

/// Body of the PATCH that claims a member record.
#[derive(Debug, Serialize)]
pub struct LinkMemberPatch<'a> {
    pub user_id: &'a str,
}

/// Body of the PATCH that records an admin sign-in.
#[derive(Debug, Serialize)]
pub struct AdminLoginPatch<'a> {
    pub last_login: DateTime<Utc>,
    pub name: &'a str,
    pub avatar_url: Option<&'a str>,
    pub user_id: &'a str,
}

impl<'a> From<&'a LoginRecord> for AdminLoginPatch<'a> {
    fn from(record: &'a LoginRecord) -> Self {
        Self {
            last_login: record.logged_in_at,
            name: &record.display_name,
            avatar_url: record.avatar_url.as_deref(),
            user_id: record.subject.as_str(),
        }
    }
}

/// Provider information attached to an auth user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppMetadata {
    pub provider: Option<String>,
}

/// The user object returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: ProfileMetadata,
}

impl AuthUser {
    /// Converts the auth user into a session.
    ///
    /// Users without a provider tag signed up with email.
    #[must_use]
    pub fn into_session(self) -> Session {
        let provider = self
            .app_metadata
            .provider
            .map_or(IdentityProvider::Email, IdentityProvider::from);
        let session = Session::new(SubjectId::from(self.id), provider)
            .with_metadata(self.user_metadata);
        match self.email.filter(|email| !email.trim().is_empty()) {
            Some(email) => session.with_email(email),
            None => session,
        }
    }
}

/// Request body of the PKCE code exchange.
#[derive(Debug, Serialize)]
pub struct PkceExchangeRequest<'a> {
    pub auth_code: &'a str,
    pub code_verifier: &'a str,
}

/// Tokens issued by the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub user: Option<AuthUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_user_maps_provider_and_metadata() {
        let user: AuthUser = serde_json::from_value(serde_json::json!({
            "id": "8d0c5a1e",
            "email": "admin@lab.edu",
            "app_metadata": { "provider": "google", "providers": ["google"] },
            "user_metadata": {
                "full_name": "Ada Admin",
                "picture": "https://img.example/a.png",
                "email_verified": true
            }
        }))
        .expect("valid user");

        let session = user.into_session();

        assert_eq!(session.subject().as_str(), "8d0c5a1e");
        assert_eq!(session.email(), Some("admin@lab.edu"));
        assert_eq!(session.provider(), &IdentityProvider::Google);
        assert_eq!(session.display_name(), Some("Ada Admin"));
        assert_eq!(session.avatar_url(), Some("https://img.example/a.png"));
    }

    #[test]
    fn auth_user_without_provider_is_email() {
        let user: AuthUser =
            serde_json::from_value(serde_json::json!({ "id": "u1", "email": "" }))
                .expect("valid user");
        let session = user.into_session();
        assert_eq!(session.provider(), &IdentityProvider::Email);
        assert_eq!(session.email(), None);
    }

    #[test]
    fn member_row_converts_with_link() {
        let id = MemberId::new();
        let row: TeamMemberRow = serde_json::from_value(serde_json::json!({
            "id": id.as_ulid().to_string(),
            "email": "grace@lab.edu",
            "user_id": "u1",
            "name": "Grace",
            "title": "PhD student",
            "avatar_url": null,
            "updated_at": "2026-03-01T12:00:00Z"
        }))
        .expect("valid row");

        let member = row.into_profile().expect("valid profile");

        assert_eq!(member.id(), id);
        assert_eq!(member.subject().map(SubjectId::as_str), Some("u1"));
        assert_eq!(member.title(), Some("PhD student"));
    }

    #[test]
    fn admin_row_with_bad_id_is_rejected() {
        let row = AdminUserRow {
            id: "not-an-id".to_string(),
            email: "admin@lab.edu".to_string(),
            name: None,
            avatar_url: None,
            role: None,
            last_login: None,
        };
        assert!(row.into_profile().is_err());
    }

    #[test]
    fn login_patch_serializes_expected_columns() {
        let session = Session::new("u1".into(), IdentityProvider::Google);
        let record = LoginRecord::from_session(&session, "admin@lab.edu", Utc::now());
        let patch = serde_json::to_value(AdminLoginPatch::from(&record)).expect("serializes");

        assert_eq!(patch["user_id"], "u1");
        assert_eq!(patch["name"], "admin@lab.edu");
        assert!(patch["avatar_url"].is_null());
        assert!(patch["last_login"].is_string());
    }
}
