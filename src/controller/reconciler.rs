//! CloudBucket reconciliation
//!
//! [`BucketReconciler`] is the state machine. It is stateless across calls:
//! everything it knows comes from the stored CloudBucket and the remote
//! bucket service. [`run_controller`] wires it into kube-runtime, which
//! serializes calls per object and handles requeues.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use prometheus_client::registry::Registry;
use tracing::{debug, error, info, instrument, warn};

use super::finalizers::{add_finalizer, has_finalizer, remove_finalizer};
use super::labels::merge_labels;
use super::naming::NameSource;
use super::recorder::{BucketCounter, BucketEvent, Recorder};
use super::store::{ObjectKey, ResourceStore};
use crate::crd::{CloudBucket, CloudBucketStatus, DeletePolicy, LastOperation};
use crate::error::{Error, Result};
use crate::gcs::{BucketService, NewBucket};

/// Delay before retrying after a failed reconciliation
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Deadline for each remote call and each store write
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Periodic re-check of converged buckets, catches out-of-band deletion
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);
/// Requeue delay after a stale write, long enough to avoid a hot loop
const CONFLICT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub retry_delay: Duration,
    pub call_timeout: Duration,
    pub resync_interval: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
        }
    }
}

fn status_of(bucket: &CloudBucket) -> &CloudBucketStatus {
    static EMPTY: CloudBucketStatus = CloudBucketStatus {
        bucket_exists: false,
        bucket_name: String::new(),
        last_operation: None,
        error_message: String::new(),
        applied_labels: std::collections::BTreeMap::new(),
        observed_generation: None,
        conditions: Vec::new(),
    };
    bucket.status.as_ref().unwrap_or(&EMPTY)
}

fn status_of_mut(bucket: &mut CloudBucket) -> &mut CloudBucketStatus {
    bucket.status.get_or_insert_with(CloudBucketStatus::default)
}

/// Give a never-reconciled resource its Pending status, keeping anything
/// already recorded.
fn ensure_status(bucket: &mut CloudBucket) {
    if status_of(bucket).is_blank() {
        let previous = bucket.status.take().unwrap_or_default();
        bucket.status = Some(CloudBucketStatus {
            bucket_name: previous.bucket_name,
            applied_labels: previous.applied_labels,
            ..CloudBucketStatus::pending()
        });
    }
}

/// Decides and applies the remote mutation for one CloudBucket
pub struct BucketReconciler {
    store: Arc<dyn ResourceStore>,
    buckets: Arc<dyn BucketService>,
    recorder: Arc<dyn Recorder>,
    names: Arc<dyn NameSource>,
    settings: ReconcilerSettings,
}

impl BucketReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        buckets: Arc<dyn BucketService>,
        recorder: Arc<dyn Recorder>,
        names: Arc<dyn NameSource>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            buckets,
            recorder,
            names,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Requeue decision for a failed reconciliation
    pub fn retry_action(&self, error: &Error) -> Action {
        if error.is_conflict() {
            Action::requeue(CONFLICT_RETRY_DELAY)
        } else {
            Action::requeue(self.settings.retry_delay)
        }
    }

    /// Run `fut` under the call deadline
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation,
                after: self.settings.call_timeout,
            }),
        }
    }

    async fn persist_status(&self, bucket: &mut CloudBucket) -> Result<CloudBucket> {
        let generation = bucket.metadata.generation;
        status_of_mut(bucket).observed_generation = generation;
        self.bounded("update status", self.store.update_status(bucket))
            .await
    }

    /// Report a store failure and hand the error back. A stale write is
    /// retried from a fresh read and is not reported as a failure.
    fn store_failure(
        &self,
        bucket: &CloudBucket,
        reason: &'static str,
        context: &str,
        err: Error,
    ) -> Error {
        if err.is_conflict() {
            debug!("{}: {}", context, err);
            return err;
        }
        error!("{}: {}", context, err);
        self.recorder.increment(BucketCounter::Errors);
        self.recorder.event(
            bucket,
            BucketEvent::warning(reason, format!("{}: {}", context, err)),
        );
        err
    }

    /// Record a failed step in the status, persist it, and hand the error back.
    /// A failure to persist is logged and counted; the original error wins.
    async fn fail(
        &self,
        mut bucket: CloudBucket,
        reason: &'static str,
        context: &str,
        err: Error,
    ) -> Error {
        error!("{}: {}", context, err);
        self.recorder.increment(BucketCounter::Errors);

        let message = err.status_message();
        status_of_mut(&mut bucket).record_failure(message.clone());
        self.recorder.event(
            &bucket,
            BucketEvent::warning(reason, format!("{}: {}", context, message)),
        );

        if let Err(update_err) = self.persist_status(&mut bucket).await {
            error!("Failed to update CloudBucket status: {}", update_err);
            self.recorder.increment(BucketCounter::Errors);
        }
        err
    }

    /// Reconcile the CloudBucket identified by `key`
    ///
    /// `Action::await_change()` means done, `Action::requeue` asks for a later
    /// pass, and an error asks the caller to retry via [`Self::retry_action`].
    #[instrument(skip(self, key), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        let fetched = match self.bounded("get", self.store.get(key)).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!("Failed to get CloudBucket {}: {}", key, e);
                self.recorder.increment(BucketCounter::Errors);
                return Err(e);
            }
        };
        let Some(mut bucket) = fetched else {
            info!("CloudBucket {} not found, ignoring", key);
            return Ok(Action::await_change());
        };

        ensure_status(&mut bucket);

        if bucket.metadata.deletion_timestamp.is_some() {
            if !has_finalizer(&bucket) {
                debug!("CloudBucket {} is being deleted and has no finalizer", key);
                return Ok(Action::await_change());
            }
            return self.cleanup(bucket).await;
        }

        self.apply(bucket).await
    }

    /// Deletion intent with the finalizer present: delete or orphan the
    /// remote bucket, then release the resource.
    async fn cleanup(&self, mut bucket: CloudBucket) -> Result<Action> {
        let bucket_name = status_of(&bucket).bucket_name.clone();

        if bucket.spec.delete_policy == DeletePolicy::Delete && !bucket_name.is_empty() {
            info!("Deleting bucket {} due to CloudBucket deletion", bucket_name);
            match self
                .bounded("delete bucket", self.buckets.delete(&bucket_name))
                .await
            {
                Ok(()) => {}
                Err(Error::BucketNotFound(_)) => {
                    info!("Bucket {} is already gone", bucket_name);
                }
                Err(e) => {
                    return Err(self
                        .fail(bucket, "BucketFailed", "Failed to delete bucket", e)
                        .await);
                }
            }

            let status = status_of_mut(&mut bucket);
            status.bucket_exists = false;
            status.record_success(LastOperation::Deleted);
            self.recorder.increment(BucketCounter::Deleted);
            self.recorder.event(
                &bucket,
                BucketEvent::normal(
                    "BucketDeleted",
                    format!("Bucket {} deleted successfully", bucket_name),
                ),
            );
        } else {
            info!(
                "Orphaning bucket {:?} due to deletePolicy {}",
                bucket_name, bucket.spec.delete_policy
            );
            status_of_mut(&mut bucket).record_success(LastOperation::Orphaned);
            self.recorder.increment(BucketCounter::Orphaned);
            self.recorder.event(
                &bucket,
                BucketEvent::normal(
                    "BucketOrphaned",
                    format!("Bucket {} orphaned due to delete policy", bucket_name),
                ),
            );
        }

        // Status goes first: the object may vanish as soon as the finalizer is gone
        let mut bucket = match self.persist_status(&mut bucket).await {
            Ok(stored) => stored,
            Err(e) => {
                return Err(self.store_failure(
                    &bucket,
                    "StatusUpdateFailed",
                    "Failed to update status",
                    e,
                ))
            }
        };

        remove_finalizer(&mut bucket);
        if let Err(e) = self
            .bounded("remove finalizer", self.store.update_metadata(&bucket))
            .await
        {
            return Err(self.store_failure(
                &bucket,
                "FinalizerFailed",
                "Failed to remove finalizer",
                e,
            ));
        }

        info!("Cleanup complete for CloudBucket {}", ObjectKey::of(&bucket));
        Ok(Action::await_change())
    }

    /// No deletion intent: converge the remote bucket to the spec
    async fn apply(&self, mut bucket: CloudBucket) -> Result<Action> {
        // 1. Protect the resource before anything can be created remotely
        if add_finalizer(&mut bucket) {
            debug!("Adding finalizer to CloudBucket {}", ObjectKey::of(&bucket));
            bucket = match self
                .bounded("add finalizer", self.store.update_metadata(&bucket))
                .await
            {
                Ok(stored) => stored,
                Err(e) => {
                    return Err(self.store_failure(
                        &bucket,
                        "FinalizerFailed",
                        "Failed to add finalizer",
                        e,
                    ))
                }
            };
            ensure_status(&mut bucket);
        }

        if let Err(reason) = bucket.spec.validate() {
            warn!("Validation failed for {}: {}", ObjectKey::of(&bucket), reason);
            return Err(self
                .fail(
                    bucket,
                    "ValidationFailed",
                    "Invalid CloudBucket spec",
                    Error::ValidationError(reason),
                )
                .await);
        }

        // 2. The name is durable before it is used remotely
        if status_of(&bucket).bucket_name.is_empty() {
            let name = self.names.bucket_name(&bucket.name_any());
            info!("Assigning bucket name {}", name);
            status_of_mut(&mut bucket).bucket_name = name;
            bucket = match self.persist_status(&mut bucket).await {
                Ok(stored) => stored,
                Err(e) => {
                    return Err(self.store_failure(
                        &bucket,
                        "StatusUpdateFailed",
                        "Failed to update status with bucket name",
                        e,
                    ))
                }
            };
        }

        let bucket_name = status_of(&bucket).bucket_name.clone();
        let desired_labels = merge_labels(&bucket.spec.labels);

        // 3. Compare with the remote state
        let exists = match self
            .bounded("check bucket existence", self.buckets.exists(&bucket_name))
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                return Err(self
                    .fail(bucket, "BucketFailed", "Failed to check bucket existence", e)
                    .await)
            }
        };

        if !exists {
            info!(
                bucket = %bucket_name,
                location = %bucket.spec.location,
                "Creating bucket"
            );
            let request = NewBucket {
                project_id: bucket.spec.project_id.clone(),
                name: bucket_name.clone(),
                location: bucket.spec.location.clone(),
                labels: desired_labels.clone(),
            };
            if let Err(e) = self
                .bounded("create bucket", self.buckets.create(&request))
                .await
            {
                status_of_mut(&mut bucket).bucket_exists = false;
                return Err(self
                    .fail(bucket, "BucketFailed", "Failed to create bucket", e)
                    .await);
            }

            let previously_existed = {
                let current = status_of(&bucket);
                current.bucket_exists
                    || current
                        .last_operation
                        .is_some_and(|op| op.implies_existing_bucket())
            };

            let status = status_of_mut(&mut bucket);
            status.bucket_exists = true;
            status.applied_labels = desired_labels;
            if previously_existed {
                status.record_success(LastOperation::Recreated);
                self.recorder.increment(BucketCounter::Recreated);
                self.recorder.event(
                    &bucket,
                    BucketEvent::normal(
                        "BucketRecreated",
                        format!("Bucket {} recreated after being missing", bucket_name),
                    ),
                );
            } else {
                status.record_success(LastOperation::Created);
                self.recorder.increment(BucketCounter::Created);
                self.recorder.event(
                    &bucket,
                    BucketEvent::normal(
                        "BucketCreated",
                        format!("Bucket {} created successfully", bucket_name),
                    ),
                );
            }
        } else {
            status_of_mut(&mut bucket).bucket_exists = true;

            if status_of(&bucket).applied_labels != desired_labels {
                info!("Updating labels of bucket {}", bucket_name);
                if let Err(e) = self
                    .bounded(
                        "update bucket labels",
                        self.buckets.update_labels(&bucket_name, &desired_labels),
                    )
                    .await
                {
                    return Err(self
                        .fail(bucket, "BucketFailed", "Failed to update bucket labels", e)
                        .await);
                }

                let status = status_of_mut(&mut bucket);
                status.applied_labels = desired_labels;
                status.record_success(LastOperation::LabelsUpdated);
                self.recorder.event(
                    &bucket,
                    BucketEvent::normal(
                        "LabelsUpdated",
                        format!("Bucket {} labels updated successfully", bucket_name),
                    ),
                );
            } else {
                let operation = match status_of(&bucket).last_operation {
                    None | Some(LastOperation::Pending) | Some(LastOperation::Failed) => {
                        info!("Bucket {} already exists", bucket_name);
                        self.recorder.event(
                            &bucket,
                            BucketEvent::normal("BucketExists", "Bucket already exists"),
                        );
                        LastOperation::Exists
                    }
                    Some(previous) => previous,
                };
                status_of_mut(&mut bucket).record_success(operation);
            }
        }

        // 4. Record the outcome
        if let Err(e) = self.persist_status(&mut bucket).await {
            return Err(self.store_failure(
                &bucket,
                "StatusUpdateFailed",
                "Failed to update status",
                e,
            ));
        }

        info!(
            bucket = %bucket_name,
            operation = ?status_of(&bucket).last_operation,
            "Reconciliation completed"
        );
        Ok(Action::requeue(self.settings.resync_interval))
    }
}

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub reconciler: BucketReconciler,
    /// Registry the reconciler's counters live in, served on /metrics
    pub registry: Registry,
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let cloud_buckets: Api<CloudBucket> = Api::all(client);

    info!("Starting CloudBucket controller");

    // Verify CRD exists
    match cloud_buckets.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("CloudBucket CRD is available"),
        Err(e) => {
            error!(
                "CloudBucket CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "CloudBucket CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(cloud_buckets, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!("Reconciled {}: {:?}", obj.name, action),
                Err(e) => warn!("Reconcile error: {}", e),
            }
        })
        .await;

    Ok(())
}

/// The main reconciliation function
///
/// This function is called whenever:
/// - A CloudBucket is created, updated, or deleted
/// - A requeue timer expires
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = %obj.namespace().unwrap_or_default()))]
async fn reconcile(obj: Arc<CloudBucket>, ctx: Arc<ControllerState>) -> Result<Action> {
    ctx.reconciler.reconcile(&ObjectKey::of(&obj)).await
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(bucket: Arc<CloudBucket>, error: &Error, ctx: Arc<ControllerState>) -> Action {
    if error.is_retriable() {
        warn!("Reconciliation error for {}: {}", bucket.name_any(), error);
    } else {
        error!(
            "Reconciliation invariant violated for {}: {}",
            bucket.name_any(),
            error
        );
    }
    ctx.reconciler.retry_action(error)
}
