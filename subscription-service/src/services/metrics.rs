//! Metrics module for subscription-service.
//! Provides Prometheus metrics for reconciliation, webhooks and history reads.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "subscription_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Reconciled provider records by outcome
pub static SYNC_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Provider webhook deliveries by event type and result
pub static WEBHOOK_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Meal history reads by effective tier
pub static HISTORY_QUERIES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Provider API call duration
pub static PROVIDER_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    SYNC_RECORDS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_sync_records_total",
                "Provider records reconciled by trigger and outcome"
            ),
            &["trigger", "outcome"]
        )
        .expect("Failed to register SYNC_RECORDS_TOTAL")
    });

    WEBHOOK_EVENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_webhook_events_total",
                "Provider webhook deliveries by event type and result"
            ),
            &["event_type", "result"]
        )
        .expect("Failed to register WEBHOOK_EVENTS_TOTAL")
    });

    HISTORY_QUERIES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_history_queries_total",
                "Meal history reads by tier and whether the request was clamped"
            ),
            &["tier", "clamped"]
        )
        .expect("Failed to register HISTORY_QUERIES_TOTAL")
    });

    PROVIDER_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "subscription_provider_request_duration_seconds",
                "Payment provider API call duration",
                vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
            ),
            &["operation", "status"]
        )
        .expect("Failed to register PROVIDER_REQUEST_DURATION")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_errors_total",
                "Total errors by type for alerting"
            ),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_sync_record(trigger: &str, outcome: &str) {
    if let Some(counter) = SYNC_RECORDS_TOTAL.get() {
        counter.with_label_values(&[trigger, outcome]).inc();
    }
}

pub fn record_webhook_event(event_type: &str, result: &str) {
    if let Some(counter) = WEBHOOK_EVENTS_TOTAL.get() {
        counter.with_label_values(&[event_type, result]).inc();
    }
}

pub fn record_history_query(tier: &str, clamped: bool) {
    if let Some(counter) = HISTORY_QUERIES_TOTAL.get() {
        let clamped = if clamped { "true" } else { "false" };
        counter.with_label_values(&[tier, clamped]).inc();
    }
}

pub fn record_provider_request(operation: &str, status: &str, duration_secs: f64) {
    if let Some(histogram) = PROVIDER_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[operation, status])
            .observe(duration_secs);
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
