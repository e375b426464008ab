//! Unit tests for CloudBucketSpec validation and status bookkeeping
//!
//! Tests the `CloudBucketSpec::validate()` function and the status
//! mutators that keep lastOperation and errorMessage consistent.

#[cfg(test)]
mod cloud_bucket_spec_validation {
    use std::collections::BTreeMap;

    use crate::crd::{CloudBucketSpec, DeletePolicy, MAX_LABELS};

    /// Helper to create a minimal valid CloudBucketSpec
    fn valid_spec() -> CloudBucketSpec {
        CloudBucketSpec {
            project_id: "my-project".to_string(),
            delete_policy: DeletePolicy::Orphan,
            location: String::new(),
            labels: BTreeMap::new(),
        }
    }

    fn spec_with_label(key: &str, value: &str) -> CloudBucketSpec {
        let mut spec = valid_spec();
        spec.labels.insert(key.to_string(), value.to_string());
        spec
    }

    // =========================================================================
    // Project
    // =========================================================================

    #[test]
    fn test_valid_spec_passes_validation() {
        assert!(valid_spec().validate().is_ok());
    }

    #[test]
    fn test_empty_project_fails() {
        let mut spec = valid_spec();
        spec.project_id = "   ".to_string();

        let result = spec.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("projectID"));
    }

    // =========================================================================
    // Labels
    // =========================================================================

    #[test]
    fn test_valid_labels_pass() {
        let mut spec = valid_spec();
        spec.labels.insert("team".to_string(), "media".to_string());
        spec.labels.insert("cost_center".to_string(), "cc-42".to_string());
        spec.labels.insert("empty".to_string(), String::new());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_uppercase_label_key_fails() {
        let result = spec_with_label("Team", "media").validate();
        assert!(result.unwrap_err().contains("lowercase letter"));
    }

    #[test]
    fn test_label_key_starting_with_digit_fails() {
        assert!(spec_with_label("1team", "media").validate().is_err());
    }

    #[test]
    fn test_label_key_with_dot_fails() {
        let result = spec_with_label("app.kubernetes.io", "x").validate();
        assert!(result.unwrap_err().contains("may only contain"));
    }

    #[test]
    fn test_label_value_with_uppercase_fails() {
        let result = spec_with_label("team", "Media").validate();
        assert!(result.unwrap_err().contains("value of label"));
    }

    #[test]
    fn test_long_label_value_fails() {
        let result = spec_with_label("team", &"a".repeat(64)).validate();
        assert!(result.unwrap_err().contains("exceeds"));
    }

    #[test]
    fn test_too_many_labels_fails() {
        let mut spec = valid_spec();
        for i in 0..=MAX_LABELS {
            spec.labels.insert(format!("k{}", i), "v".to_string());
        }
        assert!(spec.validate().unwrap_err().contains("at most"));
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn test_defaults_when_optional_fields_missing() {
        let spec: CloudBucketSpec =
            serde_json::from_value(serde_json::json!({ "projectID": "p" })).unwrap();

        assert_eq!(spec.delete_policy, DeletePolicy::Orphan);
        assert!(spec.location.is_empty());
        assert!(spec.labels.is_empty());
    }

    #[test]
    fn test_project_id_keeps_its_wire_name() {
        let value = serde_json::to_value(valid_spec()).unwrap();
        assert_eq!(value["projectID"], "my-project");
        assert_eq!(value["deletePolicy"], "Orphan");
        assert!(value.get("location").is_none());
    }

    #[test]
    fn test_unknown_delete_policy_rejected() {
        let result: Result<CloudBucketSpec, _> = serde_json::from_value(
            serde_json::json!({ "projectID": "p", "deletePolicy": "Retain" }),
        );
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod cloud_bucket_status {
    use crate::crd::{CloudBucketStatus, LastOperation};

    #[test]
    fn test_pending_status() {
        let status = CloudBucketStatus::pending();
        assert_eq!(status.last_operation, Some(LastOperation::Pending));
        assert!(!status.bucket_exists);
        assert!(status.error_message.is_empty());
        assert_eq!(status.conditions[0].status, "False");
    }

    #[test]
    fn test_blank_status() {
        assert!(CloudBucketStatus::default().is_blank());
        assert!(!CloudBucketStatus::pending().is_blank());
    }

    #[test]
    fn test_failure_always_carries_a_message() {
        let mut status = CloudBucketStatus::default();
        status.record_failure("");
        assert!(status.is_failed());
        assert_eq!(status.error_message, "unknown error");
    }

    #[test]
    fn test_success_clears_error() {
        let mut status = CloudBucketStatus {
            bucket_name: "b-12345678".to_string(),
            ..Default::default()
        };
        status.record_failure("quota exceeded");
        status.record_success(LastOperation::Created);

        assert_eq!(status.last_operation, Some(LastOperation::Created));
        assert!(status.error_message.is_empty());
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, "True");
        assert_eq!(status.conditions[0].reason, "Created");
    }

    #[test]
    fn test_condition_transition_time_kept_when_status_unchanged() {
        let mut status = CloudBucketStatus::default();
        status.record_success(LastOperation::Created);
        let first = status.conditions[0].last_transition_time.clone();

        status.record_success(LastOperation::LabelsUpdated);
        assert_eq!(status.conditions[0].last_transition_time, first);
        assert_eq!(status.conditions[0].reason, "LabelsUpdated");
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let mut status = CloudBucketStatus {
            bucket_exists: true,
            bucket_name: "b-12345678".to_string(),
            ..Default::default()
        };
        status.record_success(LastOperation::Exists);

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["bucketExists"], true);
        assert_eq!(value["bucketName"], "b-12345678");
        assert_eq!(value["lastOperation"], "Exists");
        assert!(value.get("errorMessage").is_none());
    }

    #[test]
    fn test_deleted_is_not_ready() {
        let mut status = CloudBucketStatus::default();
        status.record_success(LastOperation::Deleted);
        assert_eq!(status.conditions[0].status, "False");
    }
}

#[cfg(test)]
mod display_formatting {
    use crate::crd::{DeletePolicy, LastOperation};

    #[test]
    fn test_delete_policy_respects_width() {
        assert_eq!(format!("{:<8}|", DeletePolicy::Delete), "Delete  |");
        assert_eq!(format!("{:>8}", DeletePolicy::Orphan), "  Orphan");
        assert_eq!(DeletePolicy::Orphan.to_string(), "Orphan");
    }

    #[test]
    fn test_last_operation_respects_width() {
        assert_eq!(format!("{:<15}|", LastOperation::Created), "Created        |");
        assert_eq!(format!("{:-^9}", LastOperation::Exists), "-Exists--");
    }
}
