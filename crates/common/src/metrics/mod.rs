//! Metrics and observability utilities
//!
//! Provides metrics-rs counters and histograms for every stage of the
//! question pipeline with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all KGRAG metrics
pub const METRICS_PREFIX: &str = "kgrag";

/// Buckets for generation latency (CPU inference is slow)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
    120.0,  // 120s - attempt timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
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

    // Question metrics
    describe_counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions answered, by outcome"
    );

    // Graph metrics
    describe_counter!(
        format!("{}_graph_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total graph path queries"
    );

    describe_counter!(
        format!("{}_graph_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed graph path queries"
    );

    describe_histogram!(
        format!("{}_graph_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Graph path query latency in seconds"
    );

    // Evidence metrics
    describe_histogram!(
        format!("{}_facts_candidates", METRICS_PREFIX),
        Unit::Count,
        "Candidate facts pooled per question"
    );

    describe_histogram!(
        format!("{}_facts_kept", METRICS_PREFIX),
        Unit::Count,
        "Facts kept after ranking per question"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generation_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation attempts"
    );

    describe_counter!(
        format!("{}_generation_exhausted_total", METRICS_PREFIX),
        Unit::Count,
        "Generations that ran out of attempts"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation latency including retries"
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

/// Helper to record the outcome of one question
pub fn record_question(outcome: &str) {
    counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record a graph path query
pub fn record_graph_query(duration_secs: f64, entity_type: &str, success: bool) {
    counter!(
        format!("{}_graph_queries_total", METRICS_PREFIX),
        "entity_type" => entity_type.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_graph_query_duration_seconds", METRICS_PREFIX),
            "entity_type" => entity_type.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_graph_errors_total", METRICS_PREFIX),
            "entity_type" => entity_type.to_string()
        )
        .increment(1);
    }
}

/// Helper to record evidence sizes
pub fn record_evidence(candidates: usize, kept: usize) {
    histogram!(format!("{}_facts_candidates", METRICS_PREFIX)).record(candidates as f64);
    histogram!(format!("{}_facts_kept", METRICS_PREFIX)).record(kept as f64);
}

/// Helper to record one generation call (all of its attempts)
pub fn record_generation(duration_secs: f64, attempts: u32, success: bool) {
    let status = if success { "success" } else { "exhausted" };

    counter!(
        format!("{}_generation_attempts_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(u64::from(attempts));

    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .record(duration_secs);

    if !success {
        counter!(format!("{}_generation_exhausted_total", METRICS_PREFIX)).increment(1);
    }
}
