use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_generation_attempt(outcome: &'static str) {
    metrics::counter!("quiz_generation_attempts_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_attempt_saved(grade: f64) {
    metrics::counter!("quiz_attempts_recorded_total").increment(1);
    metrics::histogram!("quiz_attempt_grade").record(grade);
}

pub(crate) fn record_http_request(status: u16, latency: std::time::Duration) {
    let status = status.to_string();
    metrics::counter!("http_requests_total", "status" => status.clone()).increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status)
        .record(latency.as_secs_f64());
}
