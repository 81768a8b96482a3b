//! Prometheus metrics for the back-office service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by method and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_http_requests_total",
        "Total number of HTTP requests",
        &["method", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "backoffice_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Document counter by kind and status.
pub static DOCUMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_documents_total",
        "Total number of documents by kind and status",
        &["kind", "status"] // quote/invoice/load, per lifecycle status
    )
    .expect("Failed to register documents_total")
});

/// Fallback document-number counter; nonzero means the sequence is failing.
pub static NUMBER_FALLBACKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_number_fallbacks_total",
        "Document numbers synthesized because the sequence call failed",
        &["kind"]
    )
    .expect("Failed to register number_fallbacks_total")
});

/// Reminder dispatch counter by channel and outcome.
pub static REMINDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_reminders_total",
        "Reminder dispatch attempts by channel and outcome",
        &["channel", "outcome"]
    )
    .expect("Failed to register reminders_total")
});

/// Payment amount counter by currency.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_payment_amount_total",
        "Total payment amount by currency",
        &["currency"]
    )
    .expect("Failed to register payment_amount_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&DOCUMENTS_TOTAL);
    Lazy::force(&NUMBER_FALLBACKS_TOTAL);
    Lazy::force(&REMINDERS_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
