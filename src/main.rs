//! cloud-storage-controller: reconciles CloudBucket resources against GCS
//!
//! This binary:
//! - Watches CloudBucket resources cluster-wide
//! - Creates, relabels, recreates and deletes the backing GCS buckets
//! - Serves probes, Prometheus metrics and a read-only REST API

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use prometheus_client::registry::Registry;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cloud_storage_controller::controller::{
    run_controller, BucketReconciler, ControllerState, KubeRecorder, KubeStore, Metrics,
    RandomNames, ReconcilerSettings,
};
use cloud_storage_controller::error::{Error, Result};
use cloud_storage_controller::gcs::{GcsClient, GcsConfig, TokenSource, DEFAULT_GCS_ENDPOINT};
use cloud_storage_controller::rest_api::run_server;

/// CloudBucket controller
#[derive(Parser, Debug)]
#[command(name = "cloud-storage-controller", version, about)]
struct Args {
    /// Address of the health, metrics and REST endpoints
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Storage API base URL (point at an emulator for local runs)
    #[arg(long, env = "GCS_ENDPOINT", default_value = DEFAULT_GCS_ENDPOINT)]
    gcs_endpoint: String,

    /// Static bearer token; the metadata server is used when absent
    #[arg(long, env = "GCS_TOKEN", hide_env_values = true)]
    gcs_token: Option<String>,

    /// Send no credentials at all
    #[arg(long, env = "GCS_ANONYMOUS", conflicts_with = "gcs_token")]
    anonymous: bool,

    /// Seconds before a failed reconciliation is retried
    #[arg(long, env = "RETRY_DELAY_SECS", default_value = "30")]
    retry_delay_secs: u64,

    /// Deadline in seconds for each storage or API server call
    #[arg(long, env = "CALL_TIMEOUT_SECS", default_value = "30")]
    call_timeout_secs: u64,

    /// Seconds between re-checks of converged buckets
    #[arg(long, env = "RESYNC_SECS", default_value = "300")]
    resync_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn token_source(&self) -> TokenSource {
        match (&self.gcs_token, self.anonymous) {
            (_, true) => TokenSource::Anonymous,
            (Some(token), false) => TokenSource::Static(token.clone()),
            (None, false) => TokenSource::MetadataServer,
        }
    }

    fn settings(&self) -> Result<ReconcilerSettings> {
        if self.call_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "--call-timeout-secs must be greater than zero".to_string(),
            ));
        }
        Ok(ReconcilerSettings {
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            resync_interval: Duration::from_secs(self.resync_secs),
        })
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cloud_storage_controller=info,kube=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!(
        "Starting cloud-storage-controller v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Storage endpoint: {}", args.gcs_endpoint);

    let settings = args.settings()?;
    let client = Client::try_default().await.map_err(Error::KubeError)?;

    let mut registry = Registry::default();
    let metrics = Metrics::register(&mut registry);

    let buckets = GcsClient::new(GcsConfig {
        endpoint: args.gcs_endpoint.clone(),
        token_source: args.token_source(),
        request_timeout: settings.call_timeout,
    })?;

    let reconciler = BucketReconciler::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(buckets),
        Arc::new(KubeRecorder::new(client.clone(), metrics)),
        Arc::new(RandomNames),
        settings,
    );

    let state = Arc::new(ControllerState {
        client,
        reconciler,
        registry,
    });

    tokio::select! {
        result = run_controller(state.clone()) => {
            if let Err(e) = &result {
                error!("Controller stopped: {}", e);
            } else {
                info!("Controller shut down");
            }
            result
        }
        result = run_server(state, args.metrics_addr) => {
            if let Err(e) = &result {
                error!("HTTP server stopped: {}", e);
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["cloud-storage-controller"]);
        assert_eq!(args.metrics_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(args.gcs_endpoint, DEFAULT_GCS_ENDPOINT);
        assert_eq!(args.token_source(), TokenSource::MetadataServer);
        assert_eq!(args.settings().unwrap(), ReconcilerSettings::default());
    }

    #[test]
    fn test_token_source_selection() {
        let args = Args::parse_from(["cloud-storage-controller", "--gcs-token", "abc"]);
        assert_eq!(args.token_source(), TokenSource::Static("abc".to_string()));

        let args = Args::parse_from(["cloud-storage-controller", "--anonymous"]);
        assert_eq!(args.token_source(), TokenSource::Anonymous);
    }

    #[test]
    fn test_token_and_anonymous_conflict() {
        let result = Args::try_parse_from([
            "cloud-storage-controller",
            "--anonymous",
            "--gcs-token",
            "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_call_timeout_rejected() {
        let args = Args::parse_from(["cloud-storage-controller", "--call-timeout-secs", "0"]);
        assert!(matches!(args.settings(), Err(Error::ConfigError(_))));
    }
}
