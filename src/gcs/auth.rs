//! Access tokens for the storage API

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

/// Token endpoint of the GCE/GKE metadata server
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the metadata server says the token expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenSource {
    /// Fixed token, e.g. from `gcloud auth print-access-token`
    Static(String),
    /// Workload identity / node service account via the metadata server
    MetadataServer,
    /// No Authorization header (storage emulators)
    Anonymous,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Hands out bearer tokens, caching metadata-server tokens until shortly
/// before they expire.
pub struct TokenProvider {
    source: TokenSource,
    http: Client,
    metadata_url: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource, http: Client) -> Self {
        Self {
            source,
            http,
            metadata_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            cached: RwLock::new(None),
        }
    }

    /// Override the metadata token URL
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Current token, `None` for anonymous access
    pub async fn token(&self) -> Result<Option<String>> {
        match &self.source {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::MetadataServer => self.metadata_token().await.map(Some),
        }
    }

    async fn metadata_token(&self) -> Result<String> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        debug!("Fetching access token from metadata server");
        let resp = self
            .http
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::AuthError(format!("metadata server unreachable: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::AuthError(format!(
                "metadata server returned HTTP {}",
                resp.status()
            )));
        }

        let token: MetadataToken = resp
            .json()
            .await
            .map_err(|e| Error::AuthError(format!("invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *slot = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_and_anonymous_tokens() {
        let provider = TokenProvider::new(TokenSource::Static("abc".to_string()), Client::new());
        assert_eq!(provider.token().await.unwrap(), Some("abc".to_string()));

        let provider = TokenProvider::new(TokenSource::Anonymous, Client::new());
        assert_eq!(provider.token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(TokenSource::MetadataServer, Client::new())
            .with_metadata_url(format!("{}/token", server.uri()));

        assert_eq!(provider.token().await.unwrap(), Some("ya29.token".to_string()));
        assert_eq!(provider.token().await.unwrap(), Some("ya29.token".to_string()));
    }

    #[tokio::test]
    async fn test_metadata_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = TokenProvider::new(TokenSource::MetadataServer, Client::new())
            .with_metadata_url(format!("{}/token", server.uri()));

        let err = provider.token().await.unwrap_err();
        assert!(matches!(err, Error::AuthError(_)));
    }
}
