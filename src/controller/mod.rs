//! Controller module for CloudBucket reconciliation
//!
//! This module contains the main controller loop, the reconciliation state
//! machine and the seams it talks through: resource store, recorder and
//! bucket naming.

mod finalizers;
mod labels;
pub mod metrics;
mod naming;
mod reconciler;
mod recorder;
mod store;

pub use finalizers::{add_finalizer, has_finalizer, remove_finalizer, CLOUD_BUCKET_FINALIZER};
pub use labels::{merge_labels, MANAGED_BY_KEY, MANAGED_BY_VALUE};
pub use metrics::Metrics;
pub use naming::{generate_bucket_name, NameSource, RandomNames};
pub use reconciler::{
    run_controller, BucketReconciler, ControllerState, ReconcilerSettings, DEFAULT_CALL_TIMEOUT,
    DEFAULT_RESYNC_INTERVAL, DEFAULT_RETRY_DELAY,
};
pub use recorder::{BucketCounter, BucketEvent, EventType, KubeRecorder, Recorder};
pub use store::{KubeStore, ObjectKey, ResourceStore};
