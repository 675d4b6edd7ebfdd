//! Metrics and observability utilities
//!
//! Prometheus-style counters for the unit store and HTTP layer with
//! standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all UnitForge metrics
pub const METRICS_PREFIX: &str = "unitforge";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_unit_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Unit store operations by operation and outcome"
    );

    describe_counter!(
        format!("{}_default_repairs_total", METRICS_PREFIX),
        Unit::Count,
        "Times default resolution found several default units and repaired them"
    );

    describe_counter!(
        format!("{}_seed_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Seeding passes over the starter unit list"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record the outcome of one store operation
pub fn record_operation(operation: &'static str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_unit_operations_total", METRICS_PREFIX),
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a duplicate-default repair
pub fn record_default_repair(duplicates: usize) {
    counter!(format!("{}_default_repairs_total", METRICS_PREFIX)).increment(1);
    tracing::warn!(duplicates, "Repaired duplicate default units");
}

/// Record a seeding pass and how many units it inserted
pub fn record_seed_run(inserted: usize) {
    counter!(
        format!("{}_seed_runs_total", METRICS_PREFIX),
        "inserted" => if inserted > 0 { "some" } else { "none" }
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}
