use super::{PipelineStep, StepInputs, StepResult};
use crate::constants::{STEP_MERGE, STEP_VALIDATE_CREDITS, STEP_VALIDATE_MOVIES};
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::pipeline::processing::merge_artifacts;
use crate::types::Stage;
use std::path::PathBuf;
use tracing::info;

/// Silver step: fan-in of both validators
pub struct MergeStep {
    output_dir: PathBuf,
}

impl MergeStep {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

impl PipelineStep for MergeStep {
    fn step_name(&self) -> &'static str {
        STEP_MERGE
    }

    fn stage(&self) -> Stage {
        Stage::Silver
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![STEP_VALIDATE_MOVIES, STEP_VALIDATE_CREDITS]
    }

    fn execute(&self, inputs: &StepInputs) -> Result<StepResult> {
        let movies = inputs.artifact(STEP_VALIDATE_MOVIES)?;
        let credits = inputs.artifact(STEP_VALIDATE_CREDITS)?;
        let (artifact, stats) = merge_artifacts(movies, credits, &self.output_dir)?;
        PipelineMetrics::record_merge(&stats);

        let message = format!(
            "merged {} movies ({} with credits)",
            stats.movies, stats.matched
        );
        info!("✅ {}", message);
        Ok(StepResult::success(Some(artifact), stats.movies, message)
            .with_dropped(stats.credits_dropped)
            .with_metadata("matched", stats.matched)
            .with_metadata("movies_without_credits", stats.movies_without_credits))
    }
}
