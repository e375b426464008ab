//! Google Cloud Storage JSON API client

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::auth::{TokenProvider, TokenSource};
use super::{ensure_bucket_name, BucketService, NewBucket};
use crate::error::{Error, Result};

/// Public GCS endpoint
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Connection settings for [`GcsClient`]
#[derive(Clone, Debug)]
pub struct GcsConfig {
    /// Base URL, overridable for emulators such as fake-gcs-server
    pub endpoint: String,
    pub token_source: TokenSource,
    /// Per-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            token_source: TokenSource::MetadataServer,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct BucketLabels {
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

pub struct GcsClient {
    http: Client,
    endpoint: String,
    tokens: TokenProvider,
}

impl GcsClient {
    pub fn new(config: GcsConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn with_http_client(config: GcsConfig, http: Client) -> Self {
        Self {
            tokens: TokenProvider::new(config.token_source, http.clone()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Replace the token provider (custom metadata URL, tests)
    pub fn with_token_provider(mut self, tokens: TokenProvider) -> Self {
        self.tokens = tokens;
        self
    }

    fn bucket_url(&self, name: &str) -> String {
        format!("{}/storage/v1/b/{}", self.endpoint, name)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.tokens.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn current_labels(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let resp = self
            .authorized(
                self.http
                    .get(self.bucket_url(name))
                    .query(&[("fields", "labels")]),
            )
            .await?
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(resp.json::<BucketLabels>().await?.labels),
            StatusCode::NOT_FOUND => Err(Error::BucketNotFound(name.to_string())),
            _ => Err(api_error("Attrs", name, resp).await),
        }
    }
}

/// Turn a non-success response into `Error::StorageApi`, preferring the
/// JSON `error.message` over the raw body.
async fn api_error(operation: &'static str, bucket: &str, resp: Response) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    Error::StorageApi {
        operation,
        bucket: bucket.to_string(),
        status,
        message,
    }
}

/// Label patch body: desired labels as strings, stale remote keys as null
fn label_patch(
    current: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> Map<String, Value> {
    let mut patch: Map<String, Value> = desired
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    for key in current.keys().filter(|k| !desired.contains_key(*k)) {
        patch.insert(key.clone(), Value::Null);
    }
    patch
}

#[async_trait]
impl BucketService for GcsClient {
    async fn exists(&self, name: &str) -> Result<bool> {
        ensure_bucket_name(name)?;
        debug!("Checking existence of bucket {}", name);

        let resp = self
            .authorized(self.http.get(self.bucket_url(name)).query(&[("fields", "name")]))
            .await?
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(api_error("Attrs", name, resp).await),
        }
    }

    async fn create(&self, bucket: &NewBucket) -> Result<()> {
        ensure_bucket_name(&bucket.name)?;
        debug!(
            "Creating bucket {} in project {} (location: {:?})",
            bucket.name, bucket.project_id, bucket.location
        );

        let mut body = serde_json::json!({
            "name": bucket.name,
            "labels": bucket.labels,
        });
        if !bucket.location.is_empty() {
            body["location"] = Value::String(bucket.location.clone());
        }

        let resp = self
            .authorized(
                self.http
                    .post(format!("{}/storage/v1/b", self.endpoint))
                    .query(&[("project", bucket.project_id.as_str())])
                    .json(&body),
            )
            .await?
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                warn!("Bucket name {} is already in use", bucket.name);
                Err(Error::BucketNameTaken(bucket.name.clone()))
            }
            _ => Err(api_error("Create", &bucket.name, resp).await),
        }
    }

    async fn update_labels(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        ensure_bucket_name(name)?;

        let current = self.current_labels(name).await?;
        let body = serde_json::json!({ "labels": label_patch(&current, labels) });
        debug!("Patching labels of bucket {}: {}", name, body);

        let resp = self
            .authorized(
                self.http
                    .patch(self.bucket_url(name))
                    .query(&[("fields", "labels")])
                    .json(&body),
            )
            .await?
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::BucketNotFound(name.to_string())),
            _ => Err(api_error("Update", name, resp).await),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        ensure_bucket_name(name)?;
        debug!("Deleting bucket {}", name);

        let resp = self
            .authorized(self.http.delete(self.bucket_url(name)))
            .await?
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::BucketNotFound(name.to_string())),
            _ => Err(api_error("Delete", name, resp).await),
        }
    }
}
