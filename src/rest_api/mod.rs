//! REST API module
//!
//! Serves probes, Prometheus metrics and a read-only view of CloudBuckets.

mod dto;
mod handlers;
mod server;

pub use dto::{BucketList, BucketSummary, ErrorResponse, HealthResponse};
pub use server::run_server;
