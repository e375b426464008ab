//! cloud-storage-controller: Kubernetes operator for Google Cloud Storage buckets
//!
//! Reconciles `CloudBucket` custom resources: each one gets a generated,
//! durable bucket name, a remote bucket carrying the user's labels plus an
//! ownership marker, and a finalizer that applies the delete policy when the
//! resource goes away.

pub mod controller;
pub mod crd;
pub mod error;
pub mod gcs;
pub mod rest_api;

pub use error::{Error, Result};
