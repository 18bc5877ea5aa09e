use super::{PipelineStep, StepInputs, StepResult};
use crate::config::AggregateConfig;
use crate::constants::{STEP_ANALYZE, STEP_LOAD};
use crate::error::Result;
use crate::pipeline::processing::analyze_table;
use crate::types::Stage;
use std::path::PathBuf;
use tracing::info;

pub struct AnalyzeStep {
    outputs_dir: PathBuf,
    config: AggregateConfig,
}

impl AnalyzeStep {
    pub fn new(outputs_dir: PathBuf, config: AggregateConfig) -> Self {
        Self { outputs_dir, config }
    }
}

impl PipelineStep for AnalyzeStep {
    fn step_name(&self) -> &'static str {
        STEP_ANALYZE
    }

    fn stage(&self) -> Stage {
        Stage::Analyze
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![STEP_LOAD]
    }

    fn execute(&self, inputs: &StepInputs) -> Result<StepResult> {
        let table = inputs.artifact(STEP_LOAD)?;
        let (artifact, report) = analyze_table(table, &self.outputs_dir, &self.config)?;
        let tagged: usize = report.iter().map(|r| r.n_movies).sum();

        let message = format!("{} genres over {} genre tags", report.len(), tagged);
        info!("✅ {}", message);
        Ok(StepResult::success(Some(artifact), report.len(), message)
            .with_metadata("genre_tags", tagged))
    }
}
