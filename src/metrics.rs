//! Prometheus metrics for pipeline runs
//!
//! Recording is always safe: until `init_metrics` installs a recorder the
//! `metrics` macros are no-ops. The exporter only starts when
//! `TMDB_METRICS_ADDR` is set, so one-shot CLI runs open no listener.

use crate::pipeline::processing::{MergeStats, ValidationStats};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

pub const METRICS_ADDR_ENV: &str = "TMDB_METRICS_ADDR";

/// Install the Prometheus recorder and its HTTP listener. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let Ok(addr_str) = std::env::var(METRICS_ADDR_ENV) else {
            return;
        };
        let addr = match addr_str.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}; metrics disabled", addr_str, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                INSTALLED.store(true, Ordering::Relaxed);
                describe_metrics();
                info!("Prometheus exporter listening at http://{}/metrics", addr);
            }
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    });
}

pub fn is_enabled() -> bool {
    INSTALLED.load(Ordering::Relaxed)
}

fn describe_metrics() {
    ::metrics::describe_counter!("tmdb_pipeline_runs_total", "Pipeline runs by outcome");
    ::metrics::describe_histogram!("tmdb_pipeline_run_duration_seconds", "Wall time of a full run");
    ::metrics::describe_counter!("tmdb_step_outcomes_total", "Step completions by step and status");
    ::metrics::describe_histogram!("tmdb_step_duration_seconds", "Wall time of each step");
    ::metrics::describe_counter!("tmdb_rows_read_total", "Raw rows read by the validators");
    ::metrics::describe_counter!("tmdb_rows_dropped_total", "Raw rows dropped by the validators");
    ::metrics::describe_counter!("tmdb_nulls_filled_total", "Fields coerced to null");
    ::metrics::describe_gauge!(
        "tmdb_merge_matched",
        "Movies matched with credits in the last merge"
    );
    ::metrics::describe_gauge!("tmdb_table_rows", "Rows in the final table after the last load");
}

/// Counters and timings grouped by pipeline phase
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_step(step: &str, status: &str, duration_secs: f64) {
        ::metrics::counter!(
            "tmdb_step_outcomes_total",
            "step" => step.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        ::metrics::histogram!("tmdb_step_duration_seconds", "step" => step.to_string())
            .record(duration_secs);
    }

    pub fn record_validation(dataset: &str, stats: &ValidationStats) {
        let dataset = dataset.to_string();
        ::metrics::counter!("tmdb_rows_read_total", "dataset" => dataset.clone())
            .increment(stats.rows_read as u64);
        ::metrics::counter!("tmdb_rows_dropped_total", "dataset" => dataset.clone())
            .increment(stats.rows_dropped() as u64);
        ::metrics::counter!("tmdb_nulls_filled_total", "dataset" => dataset)
            .increment(stats.null_filled as u64);
    }

    pub fn record_merge(stats: &MergeStats) {
        ::metrics::gauge!("tmdb_merge_matched").set(stats.matched as f64);
    }

    pub fn record_load(rows: usize) {
        ::metrics::gauge!("tmdb_table_rows").set(rows as f64);
    }

    pub fn record_run(success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        ::metrics::counter!("tmdb_pipeline_runs_total", "outcome" => outcome).increment(1);
        ::metrics::histogram!("tmdb_pipeline_run_duration_seconds").record(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        PipelineMetrics::record_step("merge", "succeeded", 0.5);
        PipelineMetrics::record_load(10);
        PipelineMetrics::record_run(true, 1.0);
        assert!(!is_enabled());
    }
}
