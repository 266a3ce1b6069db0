//! Control-plane token minting.
//!
//! Hosted deployments hand out short-lived transport tokens from a REST
//! endpoint; [`SessionTokenProvider`] fetches one before the realtime
//! connection is opened. All connection details come from
//! [`ApiConfig`]; nothing is hardcoded.

use crate::config::ApiConfig;

use super::service::BackendError;

// ---------------------------------------------------------------------------
// SessionTokenProvider
// ---------------------------------------------------------------------------

/// Mints transport tokens from the control-plane API.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `timeout_secs`) come
/// exclusively from the [`ApiConfig`] passed to
/// [`SessionTokenProvider::from_config`].
pub struct SessionTokenProvider {
    client: reqwest::Client,
    config: ApiConfig,
}

impl SessionTokenProvider {
    /// Build a provider from API config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`. A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Request a fresh transport token.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is `Some(key)` and `key` is non-empty — local/dev
    /// backends that skip authentication still get a token.
    ///
    /// # Errors
    ///
    /// - [`BackendError::Timeout`] — the endpoint did not answer in time.
    /// - [`BackendError::Connect`] — the endpoint was unreachable.
    /// - [`BackendError::Rejected`] — non-2xx status (bad key, quota, …).
    /// - [`BackendError::Parse`] — the reply carried no usable token.
    pub async fn mint_token(&self) -> Result<String, BackendError> {
        let url = format!("{}/v1/realtime/token", self.config.base_url);

        let mut req = self.client.post(&url);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else if e.is_connect() {
                BackendError::Connect(e.to_string())
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Rejected(format!(
                "token endpoint returned {status}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        let token = json["token"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(BackendError::Parse(
                "token endpoint returned an empty token".into(),
            ));
        }

        Ok(token)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(api_key: Option<&str>) -> ApiConfig {
        ApiConfig {
            base_url: "http://localhost:8090".into(),
            api_key: api_key.map(|s| s.to_string()),
            timeout_secs: 10,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let config = make_config(None);
        let _provider = SessionTokenProvider::from_config(&config);
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let config = make_config(Some(""));
        let _provider = SessionTokenProvider::from_config(&config);
    }

    #[test]
    fn from_config_accepts_real_api_key() {
        let config = make_config(Some("sk-test-1234"));
        let _provider = SessionTokenProvider::from_config(&config);
    }

    /// An unreachable endpoint must surface as a transport-level error, not
    /// a panic.
    #[tokio::test]
    async fn mint_token_against_closed_port_errors() {
        let config = ApiConfig {
            // Port 9 (discard) is reliably closed for HTTP.
            base_url: "http://127.0.0.1:9".into(),
            api_key: None,
            timeout_secs: 1,
        };
        let provider = SessionTokenProvider::from_config(&config);
        let err = provider.mint_token().await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Connect(_) | BackendError::Transport(_) | BackendError::Timeout
        ));
    }
}
