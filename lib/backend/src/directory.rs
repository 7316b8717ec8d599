//! Directory lookups against the hosted backend's tables.

use async_trait::async_trait;
use labsite_access::{
    AdminProfile, Directory, DirectoryError, LoginRecord, MemberProfile, SubjectId,
    normalize_email,
};
use labsite_core::MemberId;
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{BackendClient, Filter};
use crate::error::BackendError;
use crate::types::{AdminLoginPatch, AdminUserRow, LinkMemberPatch, TeamMemberRow};

/// Table holding the admin allowlist.
pub const ADMIN_TABLE: &str = "admin_users";

/// Table holding team-member records.
pub const MEMBER_TABLE: &str = "team_members";

/// [`Directory`] backed by the hosted REST tables.
///
/// Row-level security decides what a caller may see, so requests made on
/// behalf of a signed-in user should carry their access token.
///
/// Emails match ignoring case: rows are narrowed with an `ilike` filter and
/// re-checked against the normalized email.
#[derive(Debug, Clone)]
pub struct HostedDirectory {
    client: BackendClient,
    access_token: Option<String>,
}

impl HostedDirectory {
    /// Creates a directory that authenticates with the anon key only.
    #[must_use]
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            access_token: None,
        }
    }

    /// Sends `access_token` as the bearer token.
    #[must_use]
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &str,
        filters: &[Filter<'_>],
    ) -> Result<Vec<T>, Report<DirectoryError>> {
        self.client
            .select(table, filters, self.access_token.as_deref())
            .await
            .map_err(|e| unavailable(operation, &e).into())
    }

    async fn admin_row(
        &self,
        operation: &'static str,
        email: &str,
    ) -> Result<Option<AdminUserRow>, Report<DirectoryError>> {
        let email = normalize_email(email);
        let rows: Vec<AdminUserRow> = self
            .rows(operation, ADMIN_TABLE, &[Filter::EqIgnoreCase("email", &email)])
            .await?;
        Ok(rows
            .into_iter()
            .find(|row| normalize_email(&row.email) == email))
    }
}

fn unavailable(operation: &str, err: &Report<BackendError>) -> DirectoryError {
    DirectoryError::Unavailable {
        operation: operation.to_string(),
        reason: err.to_string(),
    }
}

fn invalid(operation: &str, err: &Report<BackendError>) -> DirectoryError {
    DirectoryError::InvalidRecord {
        operation: operation.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl Directory for HostedDirectory {
    async fn find_admin_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AdminProfile>, Report<DirectoryError>> {
        const OPERATION: &str = "find_admin_by_email";
        self.admin_row(OPERATION, email)
            .await?
            .map(AdminUserRow::into_profile)
            .transpose()
            .map_err(|e| invalid(OPERATION, &e).into())
    }

    async fn find_member_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>> {
        const OPERATION: &str = "find_member_by_subject";
        let rows: Vec<TeamMemberRow> = self
            .rows(
                OPERATION,
                MEMBER_TABLE,
                &[Filter::Eq("user_id", subject.as_str())],
            )
            .await?;
        rows.into_iter()
            .next()
            .map(TeamMemberRow::into_profile)
            .transpose()
            .map_err(|e| invalid(OPERATION, &e).into())
    }

    async fn find_member_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>> {
        const OPERATION: &str = "find_member_by_email";
        let email = normalize_email(email);
        let rows: Vec<TeamMemberRow> = self
            .rows(
                OPERATION,
                MEMBER_TABLE,
                &[Filter::EqIgnoreCase("email", &email)],
            )
            .await?;
        rows.into_iter()
            .find(|row| normalize_email(&row.email) == email)
            .map(TeamMemberRow::into_profile)
            .transpose()
            .map_err(|e| invalid(OPERATION, &e).into())
    }

    async fn link_member_to_subject(
        &self,
        member_id: MemberId,
        subject: &SubjectId,
    ) -> Result<MemberProfile, Report<DirectoryError>> {
        const OPERATION: &str = "link_member_to_subject";
        let id = member_id.as_ulid().to_string();
        let rows: Vec<TeamMemberRow> = self
            .client
            .update(
                MEMBER_TABLE,
                &[Filter::Eq("id", id.as_str())],
                &LinkMemberPatch {
                    user_id: subject.as_str(),
                },
                self.access_token.as_deref(),
            )
            .await
            .map_err(|e| unavailable(OPERATION, &e))?;

        let Some(row) = rows.into_iter().next() else {
            return Err(DirectoryError::RecordMissing {
                record: member_id.to_string(),
            }
            .into());
        };
        debug!(member_id = %member_id, "member row linked");
        Ok(row.into_profile().map_err(|e| invalid(OPERATION, &e))?)
    }

    async fn record_admin_login(
        &self,
        email: &str,
        record: &LoginRecord,
    ) -> Result<(), Report<DirectoryError>> {
        const OPERATION: &str = "record_admin_login";
        let Some(admin) = self.admin_row(OPERATION, email).await? else {
            return Err(DirectoryError::RecordMissing {
                record: email.to_string(),
            }
            .into());
        };

        let rows: Vec<AdminUserRow> = self
            .client
            .update(
                ADMIN_TABLE,
                &[Filter::Eq("id", admin.id.as_str())],
                &AdminLoginPatch::from(record),
                self.access_token.as_deref(),
            )
            .await
            .map_err(|e| unavailable(OPERATION, &e))?;

        if rows.is_empty() {
            return Err(DirectoryError::RecordMissing { record: admin.id }.into());
        }
        debug!(admin_id = %admin.id, "admin login recorded");
        Ok(())
    }
}
