//! Shared types for CloudBucket specifications and status
//!
//! These types are used across the CRD definitions and controller logic.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What happens to the remote bucket when the CloudBucket is deleted
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Delete the remote bucket together with the resource
    Delete,
    /// Leave the remote bucket in place
    #[default]
    Orphan,
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            DeletePolicy::Delete => "Delete",
            DeletePolicy::Orphan => "Orphan",
        })
    }
}

/// Last action performed by the controller against the remote bucket
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LastOperation {
    /// Resource seen, nothing done yet
    Pending,
    /// Bucket created for the first time
    Created,
    /// Bucket created again after it vanished out-of-band
    Recreated,
    /// Bucket found already present
    Exists,
    /// Remote labels brought in line with the spec
    LabelsUpdated,
    /// Bucket deleted on resource deletion
    Deleted,
    /// Bucket left in place on resource deletion
    Orphaned,
    /// Last attempt failed, see errorMessage
    Failed,
}

impl LastOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LastOperation::Pending => "Pending",
            LastOperation::Created => "Created",
            LastOperation::Recreated => "Recreated",
            LastOperation::Exists => "Exists",
            LastOperation::LabelsUpdated => "LabelsUpdated",
            LastOperation::Deleted => "Deleted",
            LastOperation::Orphaned => "Orphaned",
            LastOperation::Failed => "Failed",
        }
    }

    /// True when this outcome implies the bucket was present remotely
    pub fn implies_existing_bucket(&self) -> bool {
        matches!(
            self,
            LastOperation::Created
                | LastOperation::Recreated
                | LastOperation::Exists
                | LastOperation::LabelsUpdated
        )
    }
}

impl std::fmt::Display for LastOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Condition for status reporting (Kubernetes convention)
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "Ready")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    /// Last time the condition transitioned (RFC3339)
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    /// Human-readable message
    pub message: String,
}

impl Condition {
    /// Create a new Ready condition
    pub fn ready(status: bool, reason: &str, message: &str) -> Self {
        Self {
            type_: "Ready".to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: chrono::Utc::now().to_rfc3339(),
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }
}

/// Replace or append `condition`, keeping the old transition time when the
/// status value did not change.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}
