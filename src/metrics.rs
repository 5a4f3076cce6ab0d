use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref CHALLENGES_STARTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "challenges_started_total",
        "Total number of challenge starts",
        &["outcome"] // created | resumed
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Total number of challenge submissions",
        &["outcome"] // accepted | invalid | too_frequent
    )
    .unwrap();

    pub static ref CHALLENGES_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "challenges_closed_total",
        "Total number of challenges closed",
        &["outcome"] // completed | abandoned
    )
    .unwrap();

    pub static ref SCORING_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "scoring_requests_total",
        "Total number of scoring gateway calls",
        &["status"] // ok | degraded
    )
    .unwrap();

    pub static ref REWARD_IMAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reward_images_total",
        "Total number of reward image generation attempts",
        &["status"] // generated | failed
    )
    .unwrap();

    pub static ref TRIAL_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trial_submissions_total",
        "Total number of trial (unauthenticated) submissions",
        &["outcome"] // scored | invalid
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = SUBMISSIONS_TOTAL.with_label_values(&["accepted"]).get();
    }

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let result = render_metrics();
        assert!(result.is_ok());
        assert!(result.unwrap().contains("http_requests_total"));
    }
}
