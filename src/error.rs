//! Central error types for the cloud-storage-controller operator
//!
//! Uses `thiserror` for ergonomic, type-safe error handling with
//! automatic `Display` and `Error` trait implementations.

use std::time::Duration;

use thiserror::Error;

/// Central error type for the cloud-storage-controller operator
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error from kube-rs
    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] kube::Error),

    /// A write was rejected because the resource changed since it was read
    #[error("Conflicting write to {0}, resource was modified concurrently")]
    Conflict(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// CloudBucket spec validation error
    #[error("Spec validation error: {0}")]
    ValidationError(String),

    /// An empty bucket name reached a remote call
    #[error("Invalid bucket name {0:?}: bucket name cannot be empty")]
    InvalidBucketName(String),

    /// Remote bucket does not exist
    #[error("Bucket {0} not found")]
    BucketNotFound(String),

    /// Remote rejected the create because the name is already in use
    #[error("Bucket name {0} is already taken")]
    BucketNameTaken(String),

    /// Non-success answer from the storage API
    #[error("Bucket({bucket:?}).{operation}: HTTP {status}: {message}")]
    StorageApi {
        operation: &'static str,
        bucket: String,
        status: u16,
        message: String,
    },

    /// Could not obtain credentials for the storage API
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// HTTP transport error (from reqwest)
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A collaborator call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ref resp) if resp.code == 409 => Error::Conflict(resp.message.clone()),
            other => Error::KubeError(other),
        }
    }
}

impl Error {
    /// Check if this error type should trigger a retry
    ///
    /// Everything except an invalid bucket name is worth retrying: remote
    /// failures are transient and a spec fix re-triggers reconciliation anyway.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Error::InvalidBucketName(_))
    }

    /// Stale write rejected by the resource store
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Convert to a human-readable message for status updates
    pub fn status_message(&self) -> String {
        match self {
            Error::KubeError(e) => format!("Kubernetes error: {}", e),
            Error::ValidationError(msg) => format!("Validation failed: {}", msg),
            Error::BucketNameTaken(name) => format!(
                "Bucket name {} is already taken; the name is never regenerated, \
                 delete and recreate the CloudBucket to obtain a new one",
                name
            ),
            Error::HttpError(e) => format!("HTTP request failed: {}", e),
            _ => self.to_string(),
        }
    }
}
