//! Prometheus metrics for reprise.
//!
//! Tracks how requests were resolved (replayed, recorded, passed through) and how
//! long live requests took.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Requests by the handler outcome that resolved them
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "reprise_requests_total",
        "Total number of intercepted requests by outcome",
        &["method", "outcome"]  // outcome: replayed|recorded|passed_through|localhost|dropped|no_fixture|error
    )
    .unwrap();

    /// Fixtures appended to the catalog
    pub static ref FIXTURES_RECORDED_TOTAL: CounterVec = register_counter_vec!(
        "reprise_fixtures_recorded_total",
        "Total number of fixtures written",
        &["result"]  // result: success|error
    )
    .unwrap();

    /// Live request duration
    pub static ref LIVE_REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "reprise_live_request_duration_ms",
        "Duration of requests sent to the network",
        &["method", "status"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record how a request was resolved
pub fn record_outcome(method: &str, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
}

/// Helper to record a fixture write
pub fn record_fixture_write(success: bool) {
    let result = if success { "success" } else { "error" };
    FIXTURES_RECORDED_TOTAL.with_label_values(&[result]).inc();
}

/// Helper to record live request duration; status 0 marks a transport failure
pub fn record_live_duration(method: &str, status: u16, duration_ms: f64) {
    LIVE_REQUEST_DURATION_MS
        .with_label_values(&[method, &status.to_string()])
        .observe(duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_outcome("GET", "replayed");
        record_fixture_write(true);
        record_live_duration("GET", 200, 12.5);

        let output = collect_metrics();
        assert!(output.contains("reprise_requests_total"));
        assert!(output.contains("reprise_fixtures_recorded_total"));
        assert!(output.contains("reprise_live_request_duration_ms"));
    }

    #[test]
    fn test_outcome_counter_increments() {
        let before = REQUESTS_TOTAL
            .with_label_values(&["DELETE", "no_fixture"])
            .get();
        record_outcome("DELETE", "no_fixture");
        let after = REQUESTS_TOTAL
            .with_label_values(&["DELETE", "no_fixture"])
            .get();
        assert_eq!(after - before, 1.0);
    }
}
