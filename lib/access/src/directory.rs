//! The directory lookup contract consumed by the gates.
//!
//! Lookups distinguish "definitely not found" (`Ok(None)`) from "could not
//! verify" (`Err`). Callers must never treat an `Err` as a grant.

use async_trait::async_trait;
use labsite_core::MemberId;
use rootcause::Report;
use std::future::Future;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::DirectoryError;
use crate::login::LoginRecord;
use crate::profile::{AdminProfile, MemberProfile};
use crate::session::SubjectId;

/// Read access to the admin allowlist and the team directory, plus the two
/// idempotent writes the gates perform.
///
/// Email arguments are normalized with [`normalize_email`] by the caller.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_admin_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AdminProfile>, Report<DirectoryError>>;

    async fn find_member_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>>;

    async fn find_member_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MemberProfile>, Report<DirectoryError>>;

    /// Links a member record to a subject and returns the updated record.
    ///
    /// Safe to retry: linking to the subject already present changes nothing.
    async fn link_member_to_subject(
        &self,
        member_id: MemberId,
        subject: &SubjectId,
    ) -> Result<MemberProfile, Report<DirectoryError>>;

    /// Records a successful admin sign-in against the allowlist entry.
    async fn record_admin_login(
        &self,
        email: &str,
        record: &LoginRecord,
    ) -> Result<(), Report<DirectoryError>>;
}

/// Canonical form used for every email comparison.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Runs a lookup, retrying inconclusive results with backoff.
///
/// Returns the last error when every attempt was inconclusive.
pub(crate) async fn lookup_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<Option<T>, Report<DirectoryError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, Report<DirectoryError>>>,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Ok(found) => return Ok(found),
            Err(err) if retry < policy.max_retries => {
                let delay = policy.backoff(retry);
                warn!(
                    operation,
                    retry = retry + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "directory lookup inconclusive, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> Report<DirectoryError> {
        DirectoryError::Unavailable {
            operation: "test".to_string(),
            reason: "down".to_string(),
        }
        .into()
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
        }
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Admin@Lab.EDU "), "admin@lab.edu");
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = lookup_with_retry(&fast_policy(2), "test", || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(unavailable())
                } else {
                    Ok(Some("found"))
                }
            }
        })
        .await;

        assert_eq!(result.expect("lookup should succeed"), Some("found"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, _> = lookup_with_retry(&fast_policy(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await;

        assert!(result.expect("lookup should succeed").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_error() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, _> = lookup_with_retry(&fast_policy(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
