//! Finalizer bookkeeping for CloudBucket resources

use kube::ResourceExt;

use crate::crd::CloudBucket;

/// Blocks removal of a CloudBucket until its bucket was deleted or orphaned
pub const CLOUD_BUCKET_FINALIZER: &str = "cloudbuckets.mygroup.example.com/finalizer";

pub fn has_finalizer(bucket: &CloudBucket) -> bool {
    bucket.finalizers().iter().any(|f| f == CLOUD_BUCKET_FINALIZER)
}

/// Returns false when the finalizer was already present
pub fn add_finalizer(bucket: &mut CloudBucket) -> bool {
    if has_finalizer(bucket) {
        return false;
    }
    bucket
        .finalizers_mut()
        .push(CLOUD_BUCKET_FINALIZER.to_string());
    true
}

/// Returns false when there was nothing to remove
pub fn remove_finalizer(bucket: &mut CloudBucket) -> bool {
    let before = bucket.finalizers().len();
    bucket.finalizers_mut().retain(|f| f != CLOUD_BUCKET_FINALIZER);
    before != bucket.finalizers().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{CloudBucketSpec, DeletePolicy};

    fn bucket() -> CloudBucket {
        CloudBucket::new(
            "b",
            CloudBucketSpec {
                project_id: "p".to_string(),
                delete_policy: DeletePolicy::Orphan,
                location: String::new(),
                labels: Default::default(),
            },
        )
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut b = bucket();
        assert!(add_finalizer(&mut b));
        assert!(!add_finalizer(&mut b));
        assert_eq!(b.finalizers().len(), 1);
        assert!(has_finalizer(&b));
    }

    #[test]
    fn test_remove_keeps_foreign_finalizers() {
        let mut b = bucket();
        b.finalizers_mut().push("other.io/keep".to_string());
        add_finalizer(&mut b);

        assert!(remove_finalizer(&mut b));
        assert!(!remove_finalizer(&mut b));
        assert_eq!(b.finalizers(), &["other.io/keep".to_string()]);
    }
}
