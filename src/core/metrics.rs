use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;
use crate::services::retake_policy::RetakeDenial;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn attempt_started() {
    metrics::counter!("exam_attempts_started_total").increment(1);
}

pub(crate) fn retake_denied(reason: RetakeDenial) {
    metrics::counter!("exam_retake_denied_total", "reason" => reason.as_str()).increment(1);
}

pub(crate) fn answer_submitted() {
    metrics::counter!("exam_answers_submitted_total").increment(1);
}

pub(crate) fn submission_graded(passed: bool) {
    let label = if passed { "true" } else { "false" };
    metrics::counter!("exam_submissions_graded_total", "passed" => label).increment(1);
}
