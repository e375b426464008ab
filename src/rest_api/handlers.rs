//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kube::api::{Api, ListParams};
use prometheus_client::encoding::text::encode;
use tracing::{error, warn};

use super::dto::{BucketList, BucketSummary, ErrorResponse, HealthResponse};
use crate::controller::ControllerState;
use crate::crd::CloudBucket;

fn error_response(status: StatusCode, error: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
        .into_response()
}

/// Liveness: the process is serving
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness: the API server answers for CloudBuckets
pub async fn ready(State(state): State<Arc<ControllerState>>) -> Response {
    let api: Api<CloudBucket> = Api::all(state.client.clone());
    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => Json(HealthResponse {
            status: "ready".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
        .into_response(),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, "not_ready", e.to_string())
        }
    }
}

/// Prometheus text exposition of the controller's counters
pub async fn metrics(State(state): State<Arc<ControllerState>>) -> Response {
    let mut buffer = String::new();
    match encode(&mut buffer, &state.registry) {
        Ok(()) => (
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_failed",
                e.to_string(),
            )
        }
    }
}

/// List all CloudBuckets across namespaces
pub async fn list_buckets(State(state): State<Arc<ControllerState>>) -> Response {
    let api: Api<CloudBucket> = Api::all(state.client.clone());

    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let items = list.items.iter().map(BucketSummary::from).collect();
            Json(BucketList::new(items)).into_response()
        }
        Err(e) => {
            error!("Failed to list CloudBuckets: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "list_failed", e.to_string())
        }
    }
}

/// Get a specific CloudBucket
pub async fn get_bucket(
    State(state): State<Arc<ControllerState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    let api: Api<CloudBucket> = Api::namespaced(state.client.clone(), &namespace);

    match api.get(&name).await {
        Ok(bucket) => Json(BucketSummary::from(&bucket)).into_response(),
        Err(kube::Error::Api(e)) if e.code == 404 => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("CloudBucket {}/{} not found", namespace, name),
        ),
        Err(e) => {
            error!("Failed to get CloudBucket {}/{}: {}", namespace, name, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "get_failed", e.to_string())
        }
    }
}
