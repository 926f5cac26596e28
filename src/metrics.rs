// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the embedding
//! application chooses the exporter (Prometheus, OTEL, etc.).
//!
//! # Metric Naming Convention
//! - `redis_repository_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: create, get, update, delete, list, count, clear, ...
//! - `status`: success, not_found, suppressed, error

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a repository operation outcome.
pub fn record_operation(operation: &'static str, status: &'static str) {
    counter!(
        "redis_repository_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record operation latency.
pub fn record_latency(operation: &'static str, duration: Duration) {
    histogram!(
        "redis_repository_operation_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a retried attempt (connect or execute_with_retry).
pub fn record_retry(operation: &'static str) {
    counter!(
        "redis_repository_retries_total",
        "operation" => operation
    )
    .increment(1);
}

/// Set the connection-state gauge (1 = connected, 0 = disconnected).
pub fn set_connected(connected: bool) {
    gauge!("redis_repository_connected").set(if connected { 1.0 } else { 0.0 });
}
