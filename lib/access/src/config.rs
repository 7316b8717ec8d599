//! Gate configuration.
//!
//! Fields with defaults can be omitted when loading from environment
//! variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::IdentityProvider;

/// Configuration shared by the admin and member gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// The only identity provider accepted by the admin gate.
    /// Default: "google"
    #[serde(default)]
    designated_provider: IdentityProvider,
    /// How inconclusive directory lookups are retried.
    #[serde(default)]
    retry: RetryPolicy,
}

impl GateConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            designated_provider: IdentityProvider::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }

    /// Returns the identity provider the admin gate accepts.
    #[must_use]
    pub fn designated_provider(&self) -> &IdentityProvider {
        &self.designated_provider
    }

    /// Returns the retry policy for directory lookups.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy for directory lookups that could not be verified.
///
/// Backoff doubles after each failed attempt, capped at `max_backoff_ms`.
/// Exhausting the retries fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 2
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds. Default: 200
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on a single delay, in milliseconds. Default: 2000
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Returns the delay to wait before retry number `retry` (zero-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Builder for `GateConfig`.
#[derive(Debug, Default)]
pub struct GateConfigBuilder {
    designated_provider: IdentityProvider,
    retry: RetryPolicy,
}

impl GateConfigBuilder {
    /// Creates a builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity provider accepted by the admin gate.
    #[must_use]
    pub fn designated_provider(mut self, provider: IdentityProvider) -> Self {
        self.designated_provider = provider;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the `GateConfig`.
    #[must_use]
    pub fn build(self) -> GateConfig {
        GateConfig {
            designated_provider: self.designated_provider,
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_defaults() {
        let config = GateConfig::new();
        assert_eq!(config.designated_provider(), &IdentityProvider::Google);
        assert_eq!(config.retry().max_retries, 2);
        assert_eq!(config.retry().initial_backoff_ms, 200);
    }

    #[test]
    fn builder_allows_customization() {
        let config = GateConfig::builder()
            .designated_provider(IdentityProvider::Github)
            .retry(RetryPolicy::none())
            .build();

        assert_eq!(config.designated_provider(), &IdentityProvider::Github);
        assert_eq!(config.retry().max_retries, 0);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: GateConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, GateConfig::new());

        let json = r#"{"designated_provider": "github", "retry": {"max_retries": 5}}"#;
        let config: GateConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.designated_provider(), &IdentityProvider::Github);
        assert_eq!(config.retry().max_retries, 5);
        assert_eq!(config.retry().initial_backoff_ms, 200);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(80), Duration::from_millis(500));
    }
}
