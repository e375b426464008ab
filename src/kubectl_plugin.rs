//! kubectl-cloudbucket: A kubectl plugin for CloudBucket resources
//!
//! This plugin provides convenient commands to interact with CloudBucket resources:
//! - `kubectl cloudbucket crd` - Print the CustomResourceDefinition manifest
//! - `kubectl cloudbucket list` - List all CloudBucket resources
//! - `kubectl cloudbucket status [name]` - Show reconciliation status of CloudBucket(s)

use std::process;

use clap::{Parser, Subcommand};
use kube::{api::Api, Client, CustomResourceExt, ResourceExt};

use cloud_storage_controller::crd::CloudBucket;
use cloud_storage_controller::error::{Error, Result};
use cloud_storage_controller::rest_api::BucketSummary;

/// Helper function to get the last operation, "-" when nothing happened yet
fn get_operation(bucket: &CloudBucket) -> String {
    bucket
        .status
        .as_ref()
        .and_then(|s| s.last_operation)
        .map(|op| op.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Parser)]
#[command(name = "kubectl-cloudbucket")]
#[command(about = "A kubectl plugin for managing CloudBucket resources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to "default")
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "table")]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CloudBucket CustomResourceDefinition as YAML
    Crd,
    /// List all CloudBucket resources
    List {
        /// Show all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },
    /// Show reconciliation status of CloudBucket(s)
    Status {
        /// Name of a specific CloudBucket (optional, shows all if omitted)
        bucket_name: Option<String>,
        /// Show all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Crd = cli.command {
        print!("{}", crd_manifest()?);
        return Ok(());
    }

    let client = Client::try_default().await.map_err(Error::KubeError)?;

    match cli.command {
        Commands::Crd => Ok(()),
        Commands::List { all_namespaces } => {
            let buckets =
                fetch_buckets(&client, None, all_namespaces, cli.namespace.as_deref()).await?;
            match cli.output.as_str() {
                "json" => println!("{}", format_buckets_json(&buckets)?),
                "yaml" => println!("{}", format_buckets_yaml(&buckets)?),
                _ => print!("{}", format_buckets_table(&buckets, all_namespaces)),
            }
            Ok(())
        }
        Commands::Status {
            bucket_name,
            all_namespaces,
        } => {
            let buckets = fetch_buckets(
                &client,
                bucket_name.as_deref(),
                all_namespaces,
                cli.namespace.as_deref(),
            )
            .await?;

            if buckets.is_empty() {
                println!("No CloudBucket resources found.");
                return Ok(());
            }

            let summaries: Vec<BucketSummary> = buckets.iter().map(BucketSummary::from).collect();
            match cli.output.as_str() {
                "json" => println!(
                    "{}",
                    serde_json::to_string_pretty(&summaries).map_err(|e| {
                        Error::ConfigError(format!("JSON serialization error: {}", e))
                    })?
                ),
                "yaml" => println!(
                    "{}",
                    serde_yaml::to_string(&summaries).map_err(|e| {
                        Error::ConfigError(format!("YAML serialization error: {}", e))
                    })?
                ),
                _ => {
                    let show_namespace = show_namespace_column(
                        all_namespaces,
                        bucket_name.as_deref(),
                        cli.namespace.as_deref(),
                    );
                    print!("{}", format_status_table(&summaries, show_namespace));
                }
            }
            Ok(())
        }
    }
}

/// Show the namespace column when viewing all namespaces, or when neither a
/// bucket nor a namespace was named
fn show_namespace_column(all_namespaces: bool, name: Option<&str>, namespace: Option<&str>) -> bool {
    all_namespaces || (name.is_none() && namespace.is_none())
}

/// The CRD manifest, ready for `kubectl apply -f -`
fn crd_manifest() -> Result<String> {
    serde_yaml::to_string(&CloudBucket::crd())
        .map_err(|e| Error::ConfigError(format!("YAML serialization error: {}", e)))
}

async fn fetch_buckets(
    client: &Client,
    name: Option<&str>,
    all_namespaces: bool,
    namespace: Option<&str>,
) -> Result<Vec<CloudBucket>> {
    let ns = namespace.unwrap_or("default");
    if let Some(name) = name {
        let api: Api<CloudBucket> = Api::namespaced(client.clone(), ns);
        let bucket = api.get(name).await.map_err(Error::KubeError)?;
        return Ok(vec![bucket]);
    }

    let api: Api<CloudBucket> = if all_namespaces {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), ns)
    };
    Ok(api
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?
        .items)
}

/// Helper function to format buckets as JSON
fn format_buckets_json(buckets: &[CloudBucket]) -> Result<String> {
    serde_json::to_string_pretty(buckets)
        .map_err(|e| Error::ConfigError(format!("JSON serialization error: {}", e)))
}

/// Helper function to format buckets as YAML
fn format_buckets_yaml(buckets: &[CloudBucket]) -> Result<String> {
    serde_yaml::to_string(buckets)
        .map_err(|e| Error::ConfigError(format!("YAML serialization error: {}", e)))
}

/// Helper function to format the bucket list as a table
fn format_buckets_table(buckets: &[CloudBucket], show_namespace: bool) -> String {
    let mut out = String::new();
    if show_namespace {
        out.push_str(&format!(
            "{:<30} {:<15} {:<25} {:<8} {:<40} {:<15}\n",
            "NAME", "NAMESPACE", "PROJECT", "POLICY", "BUCKET", "OPERATION"
        ));
        out.push_str(&format!("{}\n", "-".repeat(138)));
    } else {
        out.push_str(&format!(
            "{:<30} {:<25} {:<8} {:<40} {:<15}\n",
            "NAME", "PROJECT", "POLICY", "BUCKET", "OPERATION"
        ));
        out.push_str(&format!("{}\n", "-".repeat(122)));
    }

    for bucket in buckets {
        let name = bucket.name_any();
        let bucket_name = bucket
            .status
            .as_ref()
            .map(|s| s.bucket_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("-");
        let operation = get_operation(bucket);
        if show_namespace {
            let namespace = bucket.namespace().unwrap_or_else(|| "default".to_string());
            out.push_str(&format!(
                "{:<30} {:<15} {:<25} {:<8} {:<40} {:<15}\n",
                name,
                namespace,
                bucket.spec.project_id,
                bucket.spec.delete_policy,
                bucket_name,
                operation
            ));
        } else {
            out.push_str(&format!(
                "{:<30} {:<25} {:<8} {:<40} {:<15}\n",
                name, bucket.spec.project_id, bucket.spec.delete_policy, bucket_name, operation
            ));
        }
    }
    out
}

fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() > max {
        format!("{}...", message.chars().take(max).collect::<String>())
    } else {
        message.to_string()
    }
}

/// Helper function to format bucket status as a table
fn format_status_table(summaries: &[BucketSummary], show_namespace: bool) -> String {
    let mut out = String::new();
    if show_namespace {
        out.push_str(&format!(
            "{:<30} {:<15} {:<8} {:<8} {:<15} {:<30}\n",
            "NAME", "NAMESPACE", "EXISTS", "READY", "OPERATION", "MESSAGE"
        ));
        out.push_str(&format!("{}\n", "-".repeat(111)));
    } else {
        out.push_str(&format!(
            "{:<30} {:<8} {:<8} {:<15} {:<30}\n",
            "NAME", "EXISTS", "READY", "OPERATION", "MESSAGE"
        ));
        out.push_str(&format!("{}\n", "-".repeat(95)));
    }

    for summary in summaries {
        let exists = if summary.bucket_exists { "Yes" } else { "No" };
        let ready = if summary.ready { "Yes" } else { "No" };
        let operation = summary
            .last_operation
            .map(|op| op.to_string())
            .unwrap_or_else(|| "-".to_string());
        let message = truncate(&summary.error_message, 27);

        if show_namespace {
            out.push_str(&format!(
                "{:<30} {:<15} {:<8} {:<8} {:<15} {:<30}\n",
                summary.name, summary.namespace, exists, ready, operation, message
            ));
        } else {
            out.push_str(&format!(
                "{:<30} {:<8} {:<8} {:<15} {:<30}\n",
                summary.name, exists, ready, operation, message
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_storage_controller::crd::{
        CloudBucketSpec, CloudBucketStatus, DeletePolicy, LastOperation,
    };
    use kube::api::ObjectMeta;

    fn create_test_bucket(name: &str, namespace: &str, operation: Option<LastOperation>) -> CloudBucket {
        let mut status = CloudBucketStatus {
            bucket_name: format!("{}-abc12345", name),
            bucket_exists: operation.is_some_and(|op| op.implies_existing_bucket()),
            ..Default::default()
        };
        match operation {
            Some(LastOperation::Failed) => status.record_failure("permission denied on project"),
            Some(op) => status.record_success(op),
            None => {}
        }

        CloudBucket {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: CloudBucketSpec {
                project_id: "my-project".to_string(),
                delete_policy: DeletePolicy::Delete,
                location: "eu".to_string(),
                labels: Default::default(),
            },
            status: Some(status),
        }
    }

    #[test]
    fn test_crd_manifest() {
        let yaml = crd_manifest().unwrap();
        assert!(yaml.contains("cloudbuckets.mygroup.example.com"));
        assert!(yaml.contains("kind: CloudBucket"));
        assert!(yaml.contains("projectID"));
    }

    #[test]
    fn test_format_buckets_json() {
        let buckets = vec![
            create_test_bucket("photos", "default", Some(LastOperation::Created)),
            create_test_bucket("logs", "default", None),
        ];

        let json = format_buckets_json(&buckets).unwrap();
        assert!(json.contains("photos"));
        assert!(json.contains("logs"));
        assert!(json.contains("\"projectID\": \"my-project\""));
        assert!(json.contains("Created"));
    }

    #[test]
    fn test_format_buckets_yaml() {
        let buckets = vec![create_test_bucket("photos", "default", Some(LastOperation::Exists))];

        let yaml = format_buckets_yaml(&buckets).unwrap();
        assert!(yaml.contains("photos"));
        assert!(yaml.contains("deletePolicy: Delete"));
    }

    #[test]
    fn test_format_buckets_table_with_namespace() {
        let buckets = vec![
            create_test_bucket("photos", "ns1", Some(LastOperation::Created)),
            create_test_bucket("logs", "ns2", None),
        ];

        let table = format_buckets_table(&buckets, true);
        assert!(table.starts_with("NAME"));
        assert!(table.contains("NAMESPACE"));
        assert!(table.contains("ns2"));
        assert!(table.contains("photos-abc12345"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_format_buckets_table_without_namespace() {
        let buckets = vec![create_test_bucket("photos", "default", Some(LastOperation::Created))];

        let table = format_buckets_table(&buckets, false);
        assert!(!table.contains("NAMESPACE"));
        assert!(table.contains("Created"));
    }

    fn column(line: &str, needle: &str) -> usize {
        line.find(needle)
            .unwrap_or_else(|| panic!("{needle:?} not found in {line:?}"))
    }

    #[test]
    fn test_format_buckets_table_columns_align() {
        for policy in [DeletePolicy::Delete, DeletePolicy::Orphan] {
            let mut bucket = create_test_bucket("photos", "ns1", Some(LastOperation::Created));
            bucket.spec.delete_policy = policy;

            for show_namespace in [false, true] {
                let table = format_buckets_table(std::slice::from_ref(&bucket), show_namespace);
                let lines: Vec<&str> = table.lines().collect();
                let (header, row) = (lines[0], lines[2]);

                assert_eq!(column(header, "POLICY"), column(row, &policy.to_string()));
                assert_eq!(column(header, "BUCKET"), column(row, "photos-abc12345"));
                assert_eq!(column(header, "OPERATION"), column(row, "Created"));
            }
        }
    }

    #[test]
    fn test_status_table_columns_align() {
        let summaries = vec![BucketSummary::from(&create_test_bucket(
            "photos",
            "ns1",
            Some(LastOperation::Failed),
        ))];

        for show_namespace in [false, true] {
            let table = format_status_table(&summaries, show_namespace);
            let lines: Vec<&str> = table.lines().collect();
            let (header, row) = (lines[0], lines[2]);

            assert_eq!(column(header, "OPERATION"), column(row, "Failed"));
            assert_eq!(column(header, "MESSAGE"), column(row, "permission"));
        }
    }

    #[test]
    fn test_status_table_truncates_messages() {
        let summaries: Vec<BucketSummary> = [
            create_test_bucket("photos", "default", Some(LastOperation::Failed)),
            create_test_bucket("logs", "default", Some(LastOperation::Created)),
        ]
        .iter()
        .map(BucketSummary::from)
        .collect();

        let table = format_status_table(&summaries, false);
        assert!(table.contains("permission denied on projec..."));
        assert!(table.contains("Failed"));
        assert!(table.lines().any(|l| l.starts_with("logs") && l.contains("Yes")));
    }

    #[test]
    fn test_show_namespace_column() {
        let test_cases = vec![
            (true, None, None, true),
            (true, Some("photos"), Some("ns"), true),
            (false, None, None, true),
            (false, Some("photos"), None, false),
            (false, None, Some("ns"), false),
            (false, Some("photos"), Some("ns"), false),
        ];

        for (all_namespaces, bucket_name, namespace, expected_show) in test_cases {
            assert_eq!(
                show_namespace_column(all_namespaces, bucket_name, namespace),
                expected_show,
                "Failed for all_namespaces={:?}, bucket_name={:?}, namespace={:?}",
                all_namespaces,
                bucket_name,
                namespace
            );
        }
    }
}
