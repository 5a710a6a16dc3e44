use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "open_hackathon_cache_hits_total",
        "Total cache lookups served from memory"
    )
    .expect("register cache_hits_total")
});

pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "open_hackathon_cache_misses_total",
        "Total cache lookups that ran the supplier"
    )
    .expect("register cache_misses_total")
});

pub static CRON_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "open_hackathon_cron_runs_total",
        "Total cron job executions",
        &["job"]
    )
    .expect("register cron_runs_total")
});

pub static CRON_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "open_hackathon_cron_failures_total",
        "Total failed cron job executions",
        &["job"]
    )
    .expect("register cron_failures_total")
});

pub static ACTIVITY_LOGS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "open_hackathon_activity_logs_total",
        "Total activity log entries written"
    )
    .expect("register activity_logs_total")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_counters() {
        CACHE_HITS_TOTAL.inc();
        CRON_RUNS_TOTAL.with_label_values(&["TestJob"]).inc();
        let (status, body) = encode_metrics();
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.contains("open_hackathon_cache_hits_total"));
        assert!(body.contains("job=\"TestJob\""));
    }
}
