//! Credential-injecting proxy for the ACLED incidents API

use crate::error::AppError;
use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Query parameters the proxy always sets itself
const CREDENTIAL_PARAMS: [&str; 2] = ["key", "email"];

/// Upstream answer, relayed to the caller unchanged
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Forwards incident queries to ACLED with the service's credentials attached
pub struct AcledProxy {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_email: Option<String>,
}

impl AcledProxy {
    pub fn new(base_url: &str, api_key: Option<String>, api_email: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.to_string(),
            api_key,
            api_email,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_email.is_some()
    }

    /// Forward the caller's query parameters with credentials added
    pub async fn forward(&self, query: &[(String, String)]) -> Result<UpstreamResponse, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Config("Missing environment variable ACLED_API_KEY".to_string())
        })?;
        let api_email = self.api_email.as_deref().ok_or_else(|| {
            AppError::Config("Missing environment variable ACLED_API_EMAIL".to_string())
        })?;

        let url = forward_url(&self.base_url, api_key, api_email, query)?;
        debug!(params = query.len(), "Forwarding ACLED request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("ACLED request failed: {e}")))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::BadGateway(format!("ACLED response failed: {e}")))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Build the upstream URL: caller params first, then the credentials
///
/// Caller-supplied `key` and `email` are dropped so they cannot replace the
/// service credentials.
fn forward_url(
    base_url: &str,
    api_key: &str,
    api_email: &str,
    query: &[(String, String)],
) -> Result<Url, AppError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Config(format!("Invalid ACLED_BASE_URL {base_url:?}: {e}")))?;

    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query
            .iter()
            .filter(|(name, _)| !CREDENTIAL_PARAMS.contains(&name.as_str()))
        {
            pairs.append_pair(name, value);
        }
        pairs.append_pair("key", api_key);
        pairs.append_pair("email", api_email);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_forward_url_adds_credentials() {
        let url = forward_url(
            "https://api.acleddata.com/acled/read",
            "secret",
            "ops@example.org",
            &query(&[("country", "Afghanistan"), ("limit", "10")]),
        )
        .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            query(&[
                ("country", "Afghanistan"),
                ("limit", "10"),
                ("key", "secret"),
                ("email", "ops@example.org"),
            ])
        );
    }

    #[test]
    fn test_caller_cannot_override_credentials() {
        let url = forward_url(
            "https://api.acleddata.com/acled/read",
            "secret",
            "ops@example.org",
            &query(&[("key", "stolen"), ("email", "attacker@example.com")]),
        )
        .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            query(&[("key", "secret"), ("email", "ops@example.org")])
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = forward_url("not a url", "k", "e", &[]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_by_name() {
        let proxy = AcledProxy::new(
            "http://127.0.0.1:9/acled/read",
            None,
            Some("ops@example.org".to_string()),
        );
        match proxy.forward(&[]).await {
            Err(AppError::Config(msg)) => assert!(msg.contains("ACLED_API_KEY")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_email_is_reported_by_name() {
        let proxy = AcledProxy::new(
            "http://127.0.0.1:9/acled/read",
            Some("secret".to_string()),
            None,
        );
        assert!(!proxy.has_credentials());
        match proxy.forward(&[]).await {
            Err(AppError::Config(msg)) => assert!(msg.contains("ACLED_API_EMAIL")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
