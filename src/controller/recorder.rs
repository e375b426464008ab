//! Fire-and-forget reporting: counters and Kubernetes Events
//!
//! Nothing reported here can fail or slow down a reconciliation.

use k8s_openapi::api::core::v1::{Event, EventSource};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::{Client, Resource, ResourceExt};
use tracing::warn;

use super::metrics::Metrics;
use crate::crd::CloudBucket;

/// Component name used on emitted Events
pub const REPORTING_COMPONENT: &str = "cloud-storage-controller";

/// Monotonic counters the reconciler reports into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketCounter {
    Created,
    Recreated,
    Deleted,
    Orphaned,
    Errors,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

/// Human-readable record attached to a CloudBucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketEvent {
    pub event_type: EventType,
    pub reason: &'static str,
    pub message: String,
}

impl BucketEvent {
    pub fn normal(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Normal,
            reason,
            message: message.into(),
        }
    }

    pub fn warning(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Warning,
            reason,
            message: message.into(),
        }
    }
}

pub trait Recorder: Send + Sync {
    fn increment(&self, counter: BucketCounter);
    fn event(&self, bucket: &CloudBucket, event: BucketEvent);
}

/// [`Recorder`] writing to prometheus counters and the Kubernetes Events API
pub struct KubeRecorder {
    client: Client,
    metrics: Metrics,
}

impl KubeRecorder {
    pub fn new(client: Client, metrics: Metrics) -> Self {
        Self { client, metrics }
    }
}

impl Recorder for KubeRecorder {
    fn increment(&self, counter: BucketCounter) {
        match counter {
            BucketCounter::Created => self.metrics.buckets_created.inc(),
            BucketCounter::Recreated => self.metrics.buckets_recreated.inc(),
            BucketCounter::Deleted => self.metrics.buckets_deleted.inc(),
            BucketCounter::Orphaned => self.metrics.buckets_orphaned.inc(),
            BucketCounter::Errors => self.metrics.errors.inc(),
        };
    }

    fn event(&self, bucket: &CloudBucket, event: BucketEvent) {
        let namespace = bucket.namespace().unwrap_or_else(|| "default".to_string());
        let events: Api<Event> = Api::namespaced(self.client.clone(), &namespace);

        let time = Time(chrono::Utc::now());
        let k8s_event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-event-", bucket.name_any())),
                ..Default::default()
            },
            type_: Some(event.event_type.as_str().to_string()),
            reason: Some(event.reason.to_string()),
            message: Some(event.message),
            involved_object: bucket.object_ref(&()),
            source: Some(EventSource {
                component: Some(REPORTING_COMPONENT.to_string()),
                ..Default::default()
            }),
            reporting_component: Some(REPORTING_COMPONENT.to_string()),
            first_timestamp: Some(time.clone()),
            last_timestamp: Some(time),
            count: Some(1),
            ..Default::default()
        };

        let reason = event.reason;
        let name = bucket.name_any();
        tokio::spawn(async move {
            if let Err(e) = events.create(&PostParams::default(), &k8s_event).await {
                warn!(
                    "Failed to emit {} event for CloudBucket {}/{}: {}",
                    reason, namespace, name, e
                );
            }
        });
    }
}
