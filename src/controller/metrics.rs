//! Prometheus metrics for the cloud-storage-controller

use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Operation counters. Cloning shares the underlying atomics.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub buckets_created: Counter,
    pub buckets_recreated: Counter,
    pub buckets_deleted: Counter,
    pub buckets_orphaned: Counter,
    pub errors: Counter,
}

impl Metrics {
    /// Create the counters and register them. Counter names get the
    /// `_total` suffix on exposition.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "cloud_storage_buckets_created",
            "Total number of GCS buckets created",
            metrics.buckets_created.clone(),
        );
        registry.register(
            "cloud_storage_buckets_recreated",
            "Total number of GCS buckets recreated after being missing",
            metrics.buckets_recreated.clone(),
        );
        registry.register(
            "cloud_storage_buckets_deleted",
            "Total number of GCS buckets deleted",
            metrics.buckets_deleted.clone(),
        );
        registry.register(
            "cloud_storage_buckets_orphaned",
            "Total number of GCS buckets orphaned",
            metrics.buckets_orphaned.clone(),
        );
        registry.register(
            "cloud_storage_errors",
            "Total number of errors during bucket operations",
            metrics.errors.clone(),
        );
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_counters_exposed_with_total_suffix() {
        let mut registry = Registry::default();
        let metrics = Metrics::register(&mut registry);
        metrics.buckets_created.inc();
        metrics.errors.inc();
        metrics.errors.inc();

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();

        assert!(out.contains("cloud_storage_buckets_created_total 1"));
        assert!(out.contains("cloud_storage_errors_total 2"));
        assert!(out.contains("cloud_storage_buckets_orphaned_total 0"));
    }
}
