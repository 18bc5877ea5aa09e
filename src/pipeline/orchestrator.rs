//! Runs a [`PipelineGraph`] to completion.
//!
//! Steps are blocking units of work and run on the blocking pool; every step
//! whose dependencies have all succeeded is started at once, so the two
//! validators overlap. After the first failure nothing new is started: steps
//! already running finish, everything still pending is reported as skipped.

use crate::config::PipelineConfig;
use crate::constants::{
    CREDITS_BRONZE_FILE, MERGED_SILVER_FILE, MOVIES_BRONZE_FILE, REPORT_FILE, STEP_ANALYZE,
    STEP_LOAD, STEP_MERGE, STEP_VALIDATE_CREDITS, STEP_VALIDATE_MOVIES,
};
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::pipeline::graph::PipelineGraph;
use crate::pipeline::steps::{StepInputs, StepResult};
use crate::storage::SqliteStore;
use crate::types::{ArtifactRef, Stage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub stage: Stage,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub artifact: Option<ArtifactRef>,
    pub processed: usize,
    pub dropped: usize,
    pub warnings: usize,
    pub message: Option<String>,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl StepReport {
    fn pending(name: &str, stage: Stage) -> Self {
        Self {
            name: name.to_string(),
            stage,
            status: StepStatus::Pending,
            started_at: None,
            duration_ms: None,
            artifact: None,
            processed: 0,
            dropped: 0,
            warnings: 0,
            message: None,
            error_kind: None,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    fn succeeded(&mut self, result: StepResult) {
        self.status = StepStatus::Succeeded;
        self.artifact = result.artifact;
        self.processed = result.processed_count;
        self.dropped = result.dropped_count;
        self.warnings = result.warning_count;
        self.message = Some(result.message);
        self.metadata = result.metadata;
    }

    fn failed(&mut self, err: &PipelineError) {
        self.status = StepStatus::Failed;
        self.error_kind = Some(err.kind());
        self.error = Some(err.to_string());
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    /// Set when the workspace or table could not be prepared; no step ran
    pub bootstrap_error: Option<String>,
    /// In execution order
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(|s| s.status)
    }

    pub fn failed_steps(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .collect()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

type StepOutcome = (&'static str, Duration, Result<StepResult>);

pub struct PipelineOrchestrator {
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Create the workspace directories and the target table. Safe to re-run.
    pub fn bootstrap(&self) -> Result<()> {
        for dir in [
            self.config.raw_dir(),
            self.config.bronze_dir(),
            self.config.silver_dir(),
            self.config.outputs_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        let store = SqliteStore::open(self.config.database_path(), &self.config.table)?;
        store.ensure_table()?;
        info!(
            "🧱 Bootstrap complete: workspace {} and table {}",
            self.config.data_dir.display(),
            self.config.table
        );
        Ok(())
    }

    /// Bootstrap, then run the standard movie graph
    pub async fn run(&self) -> Result<RunReport> {
        let graph = PipelineGraph::tmdb_default(&self.config)?;
        if let Err(e) = self.bootstrap() {
            error!("❌ Bootstrap failed: {}", e);
            let now = Utc::now();
            let report = RunReport {
                run_id: Uuid::new_v4(),
                started_at: now,
                finished_at: now,
                success: false,
                bootstrap_error: Some(e.to_string()),
                steps: graph
                    .ordered()
                    .map(|s| {
                        let mut r = StepReport::pending(s.step_name(), s.stage());
                        r.status = StepStatus::Skipped;
                        r
                    })
                    .collect(),
            };
            PipelineMetrics::record_run(false, 0.0);
            return Ok(report);
        }
        Ok(Self::run_graph(&graph).await)
    }

    /// Run one step of the standard graph on its own.
    ///
    /// Upstream artifacts are taken from their conventional locations in the
    /// workspace. Every direct upstream file must exist, so a step never runs
    /// ahead of the stage it depends on (cleanup needs the report).
    pub async fn run_step(&self, name: &str) -> Result<StepResult> {
        let graph = PipelineGraph::tmdb_default(&self.config)?;
        let step = graph
            .step(name)
            .cloned()
            .ok_or_else(|| PipelineError::Graph(format!("unknown step '{}'", name)))?;
        self.bootstrap()?;

        let known = self.conventional_artifacts();
        for upstream in step.dependencies() {
            let present = known
                .get(upstream)
                .is_some_and(|artifact| artifact.is_table() || artifact.as_path().is_file());
            if !present {
                return Err(PipelineError::MissingArtifact {
                    step: name.to_string(),
                    upstream: upstream.to_string(),
                });
            }
        }
        let inputs = graph
            .ancestors(name)
            .into_iter()
            .fold(StepInputs::new(name), |inputs, upstream| {
                match (graph.step(upstream), known.get(upstream)) {
                    (Some(up), Some(artifact)) => {
                        inputs.with_artifact(upstream, up.stage(), artifact.clone())
                    }
                    _ => inputs,
                }
            });

        info!("🔄 Running single step '{}'", name);
        let step_name = step.step_name();
        tokio::task::spawn_blocking(move || step.execute(&inputs))
            .await
            .unwrap_or_else(|e| {
                Err(PipelineError::StepAborted {
                    step: step_name.to_string(),
                    message: e.to_string(),
                })
            })
    }

    /// Where each standard step leaves its output
    fn conventional_artifacts(&self) -> HashMap<&'static str, ArtifactRef> {
        let c = &self.config;
        HashMap::from([
            (
                STEP_VALIDATE_MOVIES,
                ArtifactRef::from_path(&c.bronze_dir().join(MOVIES_BRONZE_FILE)),
            ),
            (
                STEP_VALIDATE_CREDITS,
                ArtifactRef::from_path(&c.bronze_dir().join(CREDITS_BRONZE_FILE)),
            ),
            (
                STEP_MERGE,
                ArtifactRef::from_path(&c.silver_dir().join(MERGED_SILVER_FILE)),
            ),
            (STEP_LOAD, ArtifactRef::table(&c.database_path(), &c.table)),
            (
                STEP_ANALYZE,
                ArtifactRef::from_path(&c.outputs_dir().join(REPORT_FILE)),
            ),
        ])
    }

    /// Execute every step of `graph` honouring its dependencies
    pub async fn run_graph(graph: &PipelineGraph) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!("🚀 Starting pipeline run {} ({} steps)", run_id, graph.len());

        let mut reports: HashMap<&'static str, StepReport> = graph
            .ordered()
            .map(|s| (s.step_name(), StepReport::pending(s.step_name(), s.stage())))
            .collect();
        let mut produced: HashMap<&'static str, (Stage, ArtifactRef)> = HashMap::new();
        let mut running: JoinSet<StepOutcome> = JoinSet::new();
        let mut halted = false;

        loop {
            if !halted {
                for step in graph.ordered() {
                    let name = step.step_name();
                    let ready = reports[name].status == StepStatus::Pending
                        && step
                            .dependencies()
                            .iter()
                            .all(|dep| reports[dep].status == StepStatus::Succeeded);
                    if !ready {
                        continue;
                    }

                    let inputs = graph.ancestors(name).into_iter().fold(
                        StepInputs::new(name),
                        |inputs, upstream| match produced.get(upstream) {
                            Some((stage, artifact)) => {
                                inputs.with_artifact(upstream, *stage, artifact.clone())
                            }
                            None => inputs,
                        },
                    );

                    info!("🔄 Starting step '{}' ({} upstream artifacts)", name, inputs.len());
                    if let Some(report) = reports.get_mut(name) {
                        report.status = StepStatus::Running;
                        report.started_at = Some(Utc::now());
                    }

                    let step = step.clone();
                    running.spawn(async move {
                        let started = Instant::now();
                        let joined =
                            tokio::task::spawn_blocking(move || step.execute(&inputs)).await;
                        let result = joined.unwrap_or_else(|e| {
                            Err(PipelineError::StepAborted {
                                step: name.to_string(),
                                message: e.to_string(),
                            })
                        });
                        (name, started.elapsed(), result)
                    });
                }
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (name, elapsed, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("❌ Step task lost: {}", e);
                    halted = true;
                    continue;
                }
            };

            let Some(report) = reports.get_mut(name) else {
                continue;
            };
            report.duration_ms = Some(elapsed.as_millis() as u64);
            match result {
                Ok(result) => {
                    info!(
                        "✅ Step '{}' completed in {:.2}s: {}",
                        name,
                        elapsed.as_secs_f64(),
                        result.message
                    );
                    if let Some(artifact) = &result.artifact {
                        produced.insert(name, (report.stage, artifact.clone()));
                    }
                    report.succeeded(result);
                }
                Err(e) => {
                    error!("❌ Step '{}' failed ({}): {}", name, e.kind(), e);
                    report.failed(&e);
                    if !halted {
                        warn!("⏹️ No further steps will be started in run {}", run_id);
                    }
                    halted = true;
                }
            }
            PipelineMetrics::record_step(name, report.status.as_str(), elapsed.as_secs_f64());
        }

        let steps: Vec<StepReport> = graph
            .ordered()
            .filter_map(|s| reports.remove(s.step_name()))
            .map(|mut r| {
                match r.status {
                    StepStatus::Pending => {
                        info!("⏭️ Skipping step '{}'", r.name);
                        r.status = StepStatus::Skipped;
                    }
                    // only reachable when a step task was lost
                    StepStatus::Running => {
                        r.status = StepStatus::Failed;
                        r.error_kind = Some("aborted");
                        r.error = Some("step task did not report back".to_string());
                    }
                    _ => {}
                }
                r
            })
            .collect();

        let success = steps.iter().all(|s| s.status == StepStatus::Succeeded);
        let finished_at = Utc::now();
        PipelineMetrics::record_run(success, clock.elapsed().as_secs_f64());

        if success {
            info!(
                "🎉 Pipeline run {} completed successfully in {:.2}s",
                run_id,
                clock.elapsed().as_secs_f64()
            );
        } else {
            let failed: Vec<&str> = steps
                .iter()
                .filter(|s| s.status == StepStatus::Failed)
                .map(|s| s.name.as_str())
                .collect();
            error!("💥 Pipeline run {} failed at: {}", run_id, failed.join(", "));
        }

        RunReport {
            run_id,
            started_at,
            finished_at,
            success,
            bootstrap_error: None,
            steps,
        }
    }
}
