//! Remote bucket service
//!
//! The reconciler only talks to object storage through [`BucketService`].
//! [`GcsClient`] implements it against the Google Cloud Storage JSON API.

mod auth;
mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use auth::{TokenProvider, TokenSource, DEFAULT_METADATA_TOKEN_URL};
pub use client::{GcsClient, GcsConfig, DEFAULT_GCS_ENDPOINT};

/// Everything needed to create a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBucket {
    pub project_id: String,
    pub name: String,
    /// Empty means the provider default
    pub location: String,
    pub labels: BTreeMap<String, String>,
}

#[async_trait]
pub trait BucketService: Send + Sync {
    /// Whether the bucket exists. A missing bucket is `Ok(false)`, never an error.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Create a bucket with the given location and labels
    async fn create(&self, bucket: &NewBucket) -> Result<()>;

    /// Make the bucket's labels exactly `labels`
    async fn update_labels(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()>;

    /// Delete the bucket. A missing bucket is `Error::BucketNotFound`.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Reject an empty bucket name before any remote call is made
pub fn ensure_bucket_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidBucketName(name.to_string()));
    }
    Ok(())
}
