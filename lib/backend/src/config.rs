//! Hosted backend connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the hosted backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.example.co`.
    pub url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Per-request timeout in seconds. Default: 10
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl BackendConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_defaults_when_omitted() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"url":"https://db.lab.edu","anon_key":"k"}"#)
                .expect("valid config");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }
}
