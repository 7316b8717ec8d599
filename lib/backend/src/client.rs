//! HTTP client for the hosted backend.

use reqwest::{Response, StatusCode, Url};
use rootcause::prelude::Report;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::types::{AuthUser, PkceExchangeRequest, TokenResponse};

/// A row filter on a REST table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<'a> {
    /// `column = value`, case-sensitive.
    Eq(&'a str, &'a str),
    /// `column` equal to `value` ignoring case, sent as an `ilike` pattern.
    ///
    /// `*` cannot be matched literally through the REST API, so it becomes a
    /// single-character wildcard. Callers that need an exact match must
    /// re-check the returned rows.
    EqIgnoreCase(&'a str, &'a str),
}

impl Filter<'_> {
    fn column(&self) -> &str {
        match self {
            Self::Eq(column, _) | Self::EqIgnoreCase(column, _) => column,
        }
    }

    fn operand(&self) -> String {
        match self {
            Self::Eq(_, value) => format!("eq.{value}"),
            Self::EqIgnoreCase(_, value) => format!("ilike.{}", like_literal(value)),
        }
    }
}

/// Escapes `value` so a `LIKE` pattern matches it literally, apart from `*`.
fn like_literal(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '%' | '_' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            _ => pattern.push(c),
        }
    }
    pattern
}

/// Thin wrapper over the backend's REST and auth endpoints.
///
/// Every request carries the anon key as `apikey`; the bearer token is the
/// caller's access token when there is one and the anon key otherwise.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

impl BackendClient {
    /// Creates a client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, Report<BackendError>> {
        let mut base_url = Url::parse(&config.url).map_err(|e| BackendError::InvalidUrl {
            details: format!("{}: {e}", config.url),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| BackendError::ConnectionFailed {
                details: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            anon_key: config.anon_key.clone(),
        })
    }

    /// Builds the URL of a table restricted by `filters`.
    pub fn table_url(
        &self,
        table: &str,
        filters: &[Filter<'_>],
    ) -> Result<Url, Report<BackendError>> {
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for filter in filters {
                query.append_pair(filter.column(), &filter.operand());
            }
        }
        Ok(url)
    }

    /// Builds the OAuth authorization URL for a PKCE sign-in.
    pub fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, Report<BackendError>> {
        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    /// Reads rows matching every filter.
    #[instrument(skip(self, bearer))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter<'_>],
        bearer: Option<&str>,
    ) -> Result<Vec<T>, Report<BackendError>> {
        let url = self.table_url(table, filters)?;
        let response = self
            .send(self.authorized(self.http.get(url), bearer))
            .await?;
        decode(response).await
    }

    /// Patches rows matching every filter and returns them as updated.
    #[instrument(skip(self, body, bearer))]
    pub async fn update<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &str,
        filters: &[Filter<'_>],
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Vec<T>, Report<BackendError>> {
        let url = self.table_url(table, filters)?;
        let request = self
            .authorized(self.http.patch(url), bearer)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(request).await?;
        decode(response).await
    }

    /// Resolves the user behind an access token.
    ///
    /// An expired or revoked token yields `None`.
    #[instrument(skip_all)]
    pub async fn get_user(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthUser>, Report<BackendError>> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .authorized(self.http.get(url), Some(access_token))
            .send()
            .await
            .map_err(|e| BackendError::ConnectionFailed {
                details: e.to_string(),
            })?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!(status = %response.status(), "access token rejected");
            return Ok(None);
        }
        let response = check_status(response).await?;
        decode(response).await.map(Some)
    }

    /// Revokes the session behind an access token.
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<(), Report<BackendError>> {
        let url = self.endpoint("auth/v1/logout")?;
        self.send(self.authorized(self.http.post(url), Some(access_token)))
            .await?;
        Ok(())
    }

    /// Exchanges an OAuth code and PKCE verifier for session tokens.
    #[instrument(skip_all)]
    pub async fn exchange_pkce(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, Report<BackendError>> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");
        let request = self
            .authorized(self.http.post(url), None)
            .json(&PkceExchangeRequest {
                auth_code,
                code_verifier,
            });
        let response = self.send(request).await?;
        decode(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, Report<BackendError>> {
        Ok(self
            .base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl {
                details: format!("{path}: {e}"),
            })?)
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        bearer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, Report<BackendError>> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::ConnectionFailed {
                details: e.to_string(),
            })?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, Report<BackendError>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let details = response.text().await.unwrap_or_default();
    Err(BackendError::RequestFailed {
        status: status.as_u16(),
        details,
    }
    .into())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Report<BackendError>> {
    Ok(response
        .json::<T>()
        .await
        .map_err(|e| BackendError::InvalidResponse {
            details: e.to_string(),
        })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> BackendClient {
        BackendClient::new(&BackendConfig::new(url, "anon")).expect("valid config")
    }

    #[test]
    fn table_url_adds_eq_filters() {
        let url = client("https://db.lab.edu")
            .table_url("team_members", &[Filter::Eq("id", "01J9ZQ")])
            .expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://db.lab.edu/rest/v1/team_members?select=*&id=eq.01J9ZQ"
        );
    }

    #[test]
    fn email_filter_ignores_case() {
        let url = client("https://db.lab.edu")
            .table_url("admin_users", &[Filter::EqIgnoreCase("email", "ada@lab.edu")])
            .expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://db.lab.edu/rest/v1/admin_users?select=*&email=ilike.ada%40lab.edu"
        );
    }

    #[test]
    fn like_wildcards_in_values_are_escaped() {
        assert_eq!(like_literal("a_b%c@lab.edu"), r"a\_b\%c@lab.edu");
        assert_eq!(like_literal(r"x\y"), r"x\\y");
        assert_eq!(like_literal("a*b"), "a_b");
    }

    #[test]
    fn base_path_is_preserved() {
        let url = client("https://lab.edu/backend")
            .table_url("admin_users", &[])
            .expect("valid url");
        assert_eq!(url.path(), "/backend/rest/v1/admin_users");
    }

    #[test]
    fn authorize_url_carries_pkce_challenge() {
        let url = client("https://db.lab.edu")
            .authorize_url("google", "https://lab.edu/admin", "challenge123")
            .expect("valid url");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.path(), "/auth/v1/authorize");
        assert!(pairs.contains(&("provider".to_string(), "google".to_string())));
        assert!(pairs.contains(&(
            "redirect_to".to_string(),
            "https://lab.edu/admin".to_string()
        )));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "s256".to_string())));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(BackendClient::new(&BackendConfig::new("not a url", "anon")).is_err());
    }
}
