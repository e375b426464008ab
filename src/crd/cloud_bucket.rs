//! CloudBucket Custom Resource Definition
//!
//! The CloudBucket CRD declares a Google Cloud Storage bucket that the
//! controller creates, labels and, depending on the delete policy, removes.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{upsert_condition, Condition, DeletePolicy, LastOperation};

/// Maximum number of labels the storage service accepts on a bucket
pub const MAX_LABELS: usize = 64;

const MAX_LABEL_LENGTH: usize = 63;

/// The CloudBucket CRD represents a managed cloud storage bucket.
///
/// # Example
///
/// ```yaml
/// apiVersion: mygroup.example.com/v1
/// kind: CloudBucket
/// metadata:
///   name: media_assets
///   namespace: default
/// spec:
///   projectID: my-gcp-project
///   location: eu
///   deletePolicy: Delete
///   labels:
///     team: media
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "mygroup.example.com",
    version = "v1",
    kind = "CloudBucket",
    namespaced,
    status = "CloudBucketStatus",
    shortname = "cb",
    printcolumn = r#"{"name":"Project","type":"string","jsonPath":".spec.projectID"}"#,
    printcolumn = r#"{"name":"Location","type":"string","jsonPath":".spec.location"}"#,
    printcolumn = r#"{"name":"Bucket","type":"string","jsonPath":".status.bucketName"}"#,
    printcolumn = r#"{"name":"Operation","type":"string","jsonPath":".status.lastOperation"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudBucketSpec {
    /// GCP project ID where the bucket will be created
    #[serde(rename = "projectID")]
    pub project_id: String,

    /// Whether the bucket is deleted together with the resource (Delete)
    /// or left in place (Orphan). Defaults to Orphan.
    #[serde(default)]
    pub delete_policy: DeletePolicy,

    /// GCS region or multi-region (e.g., "us", "eu", "asia").
    /// Empty means the provider default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    /// Labels applied to the bucket, in addition to the ownership marker
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl CloudBucketSpec {
    /// Validate the spec against the storage service's constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("projectID must not be empty".to_string());
        }

        if self.labels.len() > MAX_LABELS {
            return Err(format!(
                "at most {} labels are allowed, got {}",
                MAX_LABELS,
                self.labels.len()
            ));
        }

        for (key, value) in &self.labels {
            validate_label_key(key)?;
            validate_label_value(key, value)?;
        }

        Ok(())
    }
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

fn validate_label_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("labels must not contain an empty key".to_string());
    }
    if key.len() > MAX_LABEL_LENGTH {
        return Err(format!(
            "label key {:?} exceeds {} characters",
            key, MAX_LABEL_LENGTH
        ));
    }
    if !key.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(format!(
            "label key {:?} must start with a lowercase letter",
            key
        ));
    }
    if !key.chars().all(is_label_char) {
        return Err(format!(
            "label key {:?} may only contain lowercase letters, digits, '-' and '_'",
            key
        ));
    }
    Ok(())
}

fn validate_label_value(key: &str, value: &str) -> Result<(), String> {
    if value.len() > MAX_LABEL_LENGTH {
        return Err(format!(
            "value of label {:?} exceeds {} characters",
            key, MAX_LABEL_LENGTH
        ));
    }
    if !value.chars().all(is_label_char) {
        return Err(format!(
            "value of label {:?} may only contain lowercase letters, digits, '-' and '_'",
            key
        ));
    }
    Ok(())
}

/// Status subresource for CloudBucket
///
/// Only the controller writes here. `lastOperation` and `errorMessage` are
/// changed together through [`CloudBucketStatus::record_success`] and
/// [`CloudBucketStatus::record_failure`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudBucketStatus {
    /// Whether the bucket exists in GCS
    #[serde(default)]
    pub bucket_exists: bool,

    /// Actual name of the bucket in GCS. Assigned once, never changed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket_name: String,

    /// Last action performed by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Details of the last error, empty unless lastOperation is Failed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,

    /// Labels last pushed to the bucket, ownership marker included
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub applied_labels: BTreeMap<String, String>,

    /// Generation of the spec this status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Readiness conditions following Kubernetes conventions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl CloudBucketStatus {
    /// Status for a resource seen for the first time
    pub fn pending() -> Self {
        let mut status = Self {
            last_operation: Some(LastOperation::Pending),
            ..Default::default()
        };
        upsert_condition(
            &mut status.conditions,
            Condition::ready(false, "Pending", "Waiting for the bucket to be provisioned"),
        );
        status
    }

    /// Nothing has ever been recorded
    pub fn is_blank(&self) -> bool {
        !self.bucket_exists && self.last_operation.is_none()
    }

    /// Record a failed attempt. The message is never left empty.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        if message.is_empty() {
            message = "unknown error".to_string();
        }
        upsert_condition(
            &mut self.conditions,
            Condition::ready(false, "ReconcileFailed", &message),
        );
        self.last_operation = Some(LastOperation::Failed);
        self.error_message = message;
    }

    /// Record a successful step and clear any previous error
    pub fn record_success(&mut self, operation: LastOperation) {
        let ready = operation.implies_existing_bucket();
        let message = if ready {
            format!("Bucket {} is ready", self.bucket_name)
        } else {
            format!("Bucket {} {}", self.bucket_name, operation.as_str().to_lowercase())
        };
        upsert_condition(
            &mut self.conditions,
            Condition::ready(ready, operation.as_str(), &message),
        );
        self.last_operation = Some(operation);
        self.error_message.clear();
    }

    /// Whether the last attempt failed
    pub fn is_failed(&self) -> bool {
        self.last_operation == Some(LastOperation::Failed)
    }
}
