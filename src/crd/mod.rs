//! Custom Resource Definitions for the cloud-storage-controller
//!
//! This module defines the Kubernetes CRD for managing cloud storage buckets.

mod cloud_bucket;
#[cfg(test)]
mod tests;
mod types;

pub use cloud_bucket::{CloudBucket, CloudBucketSpec, CloudBucketStatus, MAX_LABELS};
pub use types::*;
