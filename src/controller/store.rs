//! Persistence of CloudBucket resources
//!
//! The reconciler reads and writes CloudBuckets only through
//! [`ResourceStore`]. Writes are optimistic: the resourceVersion carried by
//! the object must still be current, otherwise the store answers
//! [`Error::Conflict`].

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::crd::CloudBucket;
use crate::error::{Error, Result};

/// Namespace/name identity of a CloudBucket
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of(bucket: &CloudBucket) -> Self {
        Self::new(
            bucket.namespace().unwrap_or_else(|| "default".to_string()),
            bucket.name_any(),
        )
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the current object, `None` once it is gone
    async fn get(&self, key: &ObjectKey) -> Result<Option<CloudBucket>>;

    /// Write metadata and spec (finalizers). Returns the stored object.
    async fn update_metadata(&self, bucket: &CloudBucket) -> Result<CloudBucket>;

    /// Write the status subresource. Returns the stored object.
    async fn update_status(&self, bucket: &CloudBucket) -> Result<CloudBucket>;
}

/// [`ResourceStore`] backed by the Kubernetes API server
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<CloudBucket> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<CloudBucket>> {
        match self.api(&key.namespace).get(&key.name).await {
            Ok(bucket) => Ok(Some(bucket)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }

    async fn update_metadata(&self, bucket: &CloudBucket) -> Result<CloudBucket> {
        let key = ObjectKey::of(bucket);
        debug!("Replacing CloudBucket {}", key);
        // replace() sends metadata.resourceVersion, so a stale object is rejected with 409
        self.api(&key.namespace)
            .replace(&key.name, &PostParams::default(), bucket)
            .await
            .map_err(Error::from)
    }

    async fn update_status(&self, bucket: &CloudBucket) -> Result<CloudBucket> {
        let key = ObjectKey::of(bucket);
        debug!("Replacing status of CloudBucket {}", key);
        let body = serde_json::to_vec(bucket)?;
        self.api(&key.namespace)
            .replace_status(&key.name, &PostParams::default(), body)
            .await
            .map_err(Error::from)
    }
}
