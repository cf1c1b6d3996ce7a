//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{Counter, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("newsboard_http_requests_total", "Total number of API requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref DB_QUERY_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "newsboard_db_query_duration_seconds",
            "Database query duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["operation"]
    ).expect("metric can be created");

    // Post / Upload Metrics
    pub static ref POSTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "newsboard_posts_created_total",
        "Total number of posts created"
    ).expect("metric can be created");
    pub static ref UPLOAD_BYTES_TOTAL: Counter = Counter::new(
        "newsboard_upload_bytes_total",
        "Total bytes of images stored"
    ).expect("metric can be created");
    pub static ref UPLOADS_REJECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("newsboard_uploads_rejected_total", "Total number of rejected uploads"),
        &["reason"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("newsboard_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Call once per process; a second registration of the same collector fails.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
        .expect("DB_QUERY_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(POSTS_CREATED_TOTAL.clone()))
        .expect("POSTS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(UPLOAD_BYTES_TOTAL.clone()))
        .expect("UPLOAD_BYTES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(UPLOADS_REJECTED_TOTAL.clone()))
        .expect("UPLOADS_REJECTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record a finished API request.
pub fn observe_request(method: &str, endpoint: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();
}
