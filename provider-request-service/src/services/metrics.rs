//! Prometheus metrics for provider-request-service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Approval attempts by outcome.
pub static APPROVALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "provider_request_approvals_total",
        "Total number of provider request approvals attempted",
        &["status"] // ok, or the error kind
    )
    .expect("Failed to register approvals_total")
});

/// Status transitions other than approval.
pub static TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "provider_request_transitions_total",
        "Total number of provider request status transitions",
        &["to_status"]
    )
    .expect("Failed to register transitions_total")
});

/// Requests created.
pub static REQUESTS_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "provider_requests_created_total",
        "Total number of provider requests created",
        &["status"]
    )
    .expect("Failed to register requests_created")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "provider_request_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "provider_request_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&APPROVALS_TOTAL);
    Lazy::force(&TRANSITIONS_TOTAL);
    Lazy::force(&REQUESTS_CREATED);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
