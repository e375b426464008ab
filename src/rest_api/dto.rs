//! Data transfer objects for the REST API

use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::crd::{CloudBucket, DeletePolicy, LastOperation};

/// Health check response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned by the API
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Flattened view of a CloudBucket and its reconciliation outcome
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub namespace: String,
    pub name: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub location: String,
    pub delete_policy: DeletePolicy,
    pub bucket_name: String,
    pub bucket_exists: bool,
    pub last_operation: Option<LastOperation>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error_message: String,
    pub ready: bool,
}

impl From<&CloudBucket> for BucketSummary {
    fn from(bucket: &CloudBucket) -> Self {
        let status = bucket.status.clone().unwrap_or_default();
        let ready = status
            .conditions
            .iter()
            .any(|c| c.type_ == "Ready" && c.status == "True");
        Self {
            namespace: bucket.namespace().unwrap_or_default(),
            name: bucket.name_any(),
            project_id: bucket.spec.project_id.clone(),
            location: bucket.spec.location.clone(),
            delete_policy: bucket.spec.delete_policy,
            bucket_name: status.bucket_name,
            bucket_exists: status.bucket_exists,
            last_operation: status.last_operation,
            error_message: status.error_message,
            ready,
        }
    }
}

/// List response for CloudBuckets
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BucketList {
    pub items: Vec<BucketSummary>,
    pub total: usize,
}

impl BucketList {
    pub fn new(items: Vec<BucketSummary>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}
