use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
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
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sessions_total",
        "Total number of assessment sessions",
        &["mode", "event"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sessions_active",
        "Number of currently active assessment sessions"
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Total number of session submissions",
        &["mode", "status"]
    )
    .unwrap();

    pub static ref QUESTIONS_AUTO_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_auto_skipped_total",
        "Questions force-skipped by countdown expiry",
        &["mode"]
    )
    .unwrap();

    // Generation backend metrics
    pub static ref GENERATION_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "generation_calls_total",
        "Total number of calls to the generation backend",
        &["kind", "status"]
    )
    .unwrap();

    pub static ref GENERATION_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "generation_call_duration_seconds",
        "Generation backend call duration in seconds",
        &["kind"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
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

/// Helper: track one generation backend call with metrics
pub async fn track_generation_call<F, T, E>(kind: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    GENERATION_CALLS_TOTAL
        .with_label_values(&[kind, status])
        .inc();

    GENERATION_CALL_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration);

    result
}
