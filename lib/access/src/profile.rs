//! Directory records for admins and team members.

use chrono::{DateTime, Utc};
use labsite_core::{AdminId, MemberId};
use serde::{Deserialize, Serialize};

use crate::session::SubjectId;

/// An entry in the admin allowlist, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    id: AdminId,
    email: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    /// Free-form role tag, e.g. "owner" or "editor".
    role: String,
    last_login_at: Option<DateTime<Utc>>,
}

impl AdminProfile {
    /// Creates an allowlist entry with a generated id.
    #[must_use]
    pub fn new(email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: AdminId::new(),
            email: email.into(),
            display_name: None,
            avatar_url: None,
            role: role.into(),
            last_login_at: None,
        }
    }

    /// Reconstitutes a profile from storage.
    #[must_use]
    pub fn with_all_fields(
        id: AdminId,
        email: String,
        display_name: Option<String>,
        avatar_url: Option<String>,
        role: String,
        last_login_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            email,
            display_name,
            avatar_url,
            role,
            last_login_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> AdminId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    /// Applies a login record: refreshes name, avatar and last-login time.
    pub fn apply_login(
        &mut self,
        display_name: Option<String>,
        avatar_url: Option<String>,
        at: DateTime<Utc>,
    ) {
        if display_name.is_some() {
            self.display_name = display_name;
        }
        if avatar_url.is_some() {
            self.avatar_url = avatar_url;
        }
        self.last_login_at = Some(at);
    }
}

/// A team-member record.
///
/// Records are created by admins before the member ever signs in, so the
/// subject link starts out empty and is claimed on first sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    id: MemberId,
    email: String,
    subject: Option<SubjectId>,
    display_name: Option<String>,
    title: Option<String>,
    avatar_url: Option<String>,
    updated_at: DateTime<Utc>,
}

impl MemberProfile {
    /// Creates an unlinked member record.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: MemberId::new(),
            email: email.into(),
            subject: None,
            display_name: None,
            title: None,
            avatar_url: None,
            updated_at: Utc::now(),
        }
    }

    /// Reconstitutes a member record from storage.
    #[must_use]
    pub fn with_all_fields(
        id: MemberId,
        email: String,
        subject: Option<SubjectId>,
        display_name: Option<String>,
        title: Option<String>,
        avatar_url: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            subject,
            display_name,
            title,
            avatar_url,
            updated_at,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the job title shown on the team page.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Pre-links the record to a subject.
    #[must_use]
    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the linked subject, if the record has been claimed.
    #[must_use]
    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.subject.is_some()
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Links the record to a subject. Relinking to the same subject is a no-op.
    pub fn link(&mut self, subject: SubjectId) {
        if self.subject.as_ref() == Some(&subject) {
            return;
        }
        self.subject = Some(subject);
        self.updated_at = Utc::now();
    }

    /// Sets the display name.
    pub fn set_display_name(&mut self, name: Option<String>) {
        self.display_name = name;
        self.updated_at = Utc::now();
    }

    /// Sets the title.
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_member_is_unlinked() {
        let member = MemberProfile::new("grace@lab.edu");
        assert!(!member.is_linked());
        assert!(member.subject().is_none());
        assert!(member.id().to_string().starts_with("mem_"));
    }

    #[test]
    fn link_sets_subject() {
        let mut member = MemberProfile::new("grace@lab.edu");
        member.link("u1".into());
        assert_eq!(member.subject(), Some(&SubjectId::new("u1")));
    }

    #[test]
    fn relinking_same_subject_keeps_timestamp() {
        let mut member = MemberProfile::new("grace@lab.edu");
        member.link("u1".into());
        let linked_at = member.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(2));
        member.link("u1".into());

        assert_eq!(member.updated_at(), linked_at);
    }

    #[test]
    fn set_title_updates_timestamp() {
        let mut member = MemberProfile::new("grace@lab.edu");
        let before = member.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(2));
        member.set_title(Some("Research Engineer".to_string()));

        assert_eq!(member.title(), Some("Research Engineer"));
        assert!(member.updated_at() > before);
    }

    #[test]
    fn apply_login_keeps_existing_name_when_none_given() {
        let mut admin = AdminProfile::new("admin@lab.edu", "owner");
        let at = Utc::now();
        admin.apply_login(Some("Admin".to_string()), None, at);
        admin.apply_login(None, Some("https://img.example/a.png".to_string()), at);

        assert_eq!(admin.display_name(), Some("Admin"));
        assert_eq!(admin.avatar_url(), Some("https://img.example/a.png"));
        assert_eq!(admin.last_login_at(), Some(at));
    }

    #[test]
    fn member_serialization_roundtrip() {
        let member = MemberProfile::new("grace@lab.edu")
            .with_display_name("Grace")
            .with_subject("u9".into());
        let json = serde_json::to_string(&member).expect("serialize");
        let parsed: MemberProfile = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(member, parsed);
    }
}
