//! Remote label set computation

use std::collections::BTreeMap;

/// Label key marking buckets owned by this controller
pub const MANAGED_BY_KEY: &str = "managed-by";
/// Value of [`MANAGED_BY_KEY`]
pub const MANAGED_BY_VALUE: &str = "cloud-storage-controller";

/// Combine user labels with the ownership marker, which always wins
pub fn merge_labels(user_labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut labels = user_labels.clone();
    labels.insert(MANAGED_BY_KEY.to_string(), MANAGED_BY_VALUE.to_string());
    labels
}
