use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder and registers descriptions for every
/// series the pipeline emits. A no-op when the exporter is disabled.
pub fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    if RECORDER.set(handle).is_err() {
        tracing::warn!("Prometheus recorder already installed");
        return Ok(());
    }

    describe_counter!("jobs_submitted_total", "Jobs accepted by the dispatcher, by type");
    describe_counter!("jobs_total", "Finished jobs, by type and status");
    describe_histogram!("job_duration_seconds", Unit::Seconds, "Handler wall time per job");
    describe_counter!("sheets_graded_total", "Sheets that finished grading, by disposition");
    describe_counter!("sheets_failed_total", "Sheets moved to the error state");
    describe_counter!("region_scores_total", "Per-region scoring outcomes, by status");
    describe_counter!("review_items_total", "Items placed on the human review queue");
    describe_counter!("reports_generated_total", "Rendered sheet reports");
    describe_counter!("training_sessions_total", "Finished training sessions, by status");
    describe_histogram!(
        "grading_duration_seconds",
        Unit::Seconds,
        "End-to-end pipeline time per sheet"
    );
    Ok(())
}

pub fn render() -> Option<String> {
    RECORDER.get().map(PrometheusHandle::render)
}
