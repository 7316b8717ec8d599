//! Sessions as issued by the hosted identity service.
//!
//! A [`Session`] is owned by the session provider. The gates never persist one;
//! they re-read it from the provider on every resolution or receive it through
//! a change notification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject identifier assigned by the identity service.
///
/// Stable across sign-ins for the same account, which makes it a more reliable
/// directory key than an email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a subject id from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the subject id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity provider through which a session was established.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdentityProvider {
    #[default]
    Google,
    Github,
    /// Email magic link or password.
    Email,
    Other(String),
}

impl IdentityProvider {
    /// Returns the provider tag used by the identity service.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Email => "email",
            Self::Other(tag) => tag,
        }
    }

    /// Human-readable provider name for status views.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Google => "Google",
            Self::Github => "GitHub",
            Self::Email => "email",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for IdentityProvider {
    fn from(tag: String) -> Self {
        let tag = tag.to_ascii_lowercase();
        match tag.as_str() {
            "google" => Self::Google,
            "github" => Self::Github,
            "email" => Self::Email,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for IdentityProvider {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<IdentityProvider> for String {
    fn from(provider: IdentityProvider) -> Self {
        provider.as_str().to_string()
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Profile metadata the identity provider attached to the account.
///
/// Providers disagree on field names, so the common ones are picked out and
/// everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    subject: SubjectId,
    email: Option<String>,
    provider: IdentityProvider,
    #[serde(default)]
    metadata: ProfileMetadata,
}

impl Session {
    /// Creates a session for the given subject.
    #[must_use]
    pub fn new(subject: SubjectId, provider: IdentityProvider) -> Self {
        Self {
            subject,
            email: None,
            provider,
            metadata: ProfileMetadata::default(),
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the profile metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ProfileMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn provider(&self) -> &IdentityProvider {
        &self.provider
    }

    #[must_use]
    pub fn metadata(&self) -> &ProfileMetadata {
        &self.metadata
    }

    /// Best available display name: full name, then name, then email.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.metadata.full_name.as_deref())
            .or_else(|| non_empty(self.metadata.name.as_deref()))
            .or(self.email.as_deref())
    }

    /// Best available avatar URL.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        non_empty(self.metadata.avatar_url.as_deref())
            .or_else(|| non_empty(self.metadata.picture.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(full_name: Option<&str>, name: Option<&str>) -> ProfileMetadata {
        ProfileMetadata {
            full_name: full_name.map(str::to_string),
            name: name.map(str::to_string),
            ..ProfileMetadata::default()
        }
    }

    #[test]
    fn provider_tags_are_case_insensitive() {
        assert_eq!(IdentityProvider::from("Google"), IdentityProvider::Google);
        assert_eq!(IdentityProvider::from("github"), IdentityProvider::Github);
        assert_eq!(
            IdentityProvider::from("azure"),
            IdentityProvider::Other("azure".to_string())
        );
    }

    #[test]
    fn unknown_provider_tags_match_ignoring_case() {
        let designated: IdentityProvider =
            serde_json::from_str("\"okta\"").expect("deserialize");
        assert_eq!(IdentityProvider::from("Okta"), designated);
        assert_eq!(IdentityProvider::from("OKTA").as_str(), "okta");
    }

    #[test]
    fn provider_serializes_as_tag() {
        let json = serde_json::to_string(&IdentityProvider::Google).expect("serialize");
        assert_eq!(json, "\"google\"");
        let parsed: IdentityProvider = serde_json::from_str("\"email\"").expect("deserialize");
        assert_eq!(parsed, IdentityProvider::Email);
    }

    #[test]
    fn display_name_prefers_full_name() {
        let session = Session::new("u1".into(), IdentityProvider::Google)
            .with_email("ada@lab.edu")
            .with_metadata(metadata(Some("Ada Lovelace"), Some("ada")));
        assert_eq!(session.display_name(), Some("Ada Lovelace"));
    }

    #[test]
    fn display_name_falls_back_to_name_then_email() {
        let session = Session::new("u1".into(), IdentityProvider::Google)
            .with_email("ada@lab.edu")
            .with_metadata(metadata(Some("  "), Some("ada")));
        assert_eq!(session.display_name(), Some("ada"));

        let session = Session::new("u1".into(), IdentityProvider::Google).with_email("ada@lab.edu");
        assert_eq!(session.display_name(), Some("ada@lab.edu"));
    }

    #[test]
    fn avatar_falls_back_to_picture() {
        let session = Session::new("u1".into(), IdentityProvider::Google).with_metadata(
            ProfileMetadata {
                picture: Some("https://img.example/p.png".to_string()),
                ..ProfileMetadata::default()
            },
        );
        assert_eq!(session.avatar_url(), Some("https://img.example/p.png"));
    }

    #[test]
    fn metadata_keeps_unknown_fields() {
        let json = r#"{"full_name":"Ada","email_verified":true}"#;
        let parsed: ProfileMetadata = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.full_name.as_deref(), Some("Ada"));
        assert_eq!(
            parsed.extra.get("email_verified"),
            Some(&serde_json::Value::Bool(true))
        );
    }
}
