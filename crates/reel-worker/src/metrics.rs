//! Pipeline metrics.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub mod names {
    /// Assembly runs by outcome ("success" or an error kind).
    pub const COMPOSITION_RUNS_TOTAL: &str = "composition_runs_total";

    /// Wall time of a whole assembly run.
    pub const COMPOSITION_DURATION_SECONDS: &str = "composition_duration_seconds";

    /// Scenes that fell back to the placeholder clip or lost their voiceover.
    pub const SCENE_FALLBACKS_TOTAL: &str = "scene_fallbacks_total";
}

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_run(status: &'static str, duration_secs: f64) {
    counter!(names::COMPOSITION_RUNS_TOTAL, "status" => status).increment(1);
    histogram!(names::COMPOSITION_DURATION_SECONDS, "status" => status).record(duration_secs);
}

pub fn record_scene_fallback(stage: &'static str) {
    counter!(names::SCENE_FALLBACKS_TOTAL, "stage" => stage).increment(1);
}
