//! Metrics collection and Prometheus export.
//!
//! HTTP request metrics come from the shared middleware; the helpers here add
//! chat and provider specific series.

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install Prometheus recorder"),
    }
}

/// Current metrics in Prometheus text format, for the /metrics endpoint.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Terminal state of one `/api/chat` request.
pub fn record_chat_outcome(outcome: &'static str) {
    counter!("chat_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_listing_failure() {
    counter!("model_listing_failures_total").increment(1);
}

pub fn record_model_resolution(source: &'static str) {
    counter!("model_resolutions_total", "source" => source).increment(1);
}

pub fn record_provider_latency(model: &str, seconds: f64) {
    histogram!("provider_latency_seconds", "model" => model.to_string()).record(seconds);
}
