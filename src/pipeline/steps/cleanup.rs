use super::{PipelineStep, StepInputs, StepResult};
use crate::constants::{STEP_ANALYZE, STEP_CLEANUP};
use crate::error::Result;
use crate::pipeline::processing::remove_artifacts;
use crate::types::Stage;
use tracing::info;

/// Removes bronze and silver artifacts once the report exists.
///
/// Depends on the analyze step only; the intermediates reach it as transitive
/// upstream artifacts.
pub struct CleanupStep;

impl PipelineStep for CleanupStep {
    fn step_name(&self) -> &'static str {
        STEP_CLEANUP
    }

    fn stage(&self) -> Stage {
        Stage::Cleanup
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![STEP_ANALYZE]
    }

    fn execute(&self, inputs: &StepInputs) -> Result<StepResult> {
        let report = remove_artifacts(&inputs.intermediates());
        let message = format!(
            "removed {} intermediate artifacts ({} warnings)",
            report.removed.len(),
            report.warnings.len()
        );
        info!("🧹 {}", message);
        let mut result = StepResult::success(None, report.removed.len(), message)
            .with_warnings(report.warnings.len())
            .with_metadata("absent", report.absent.len());
        for (i, warning) in report.warnings.iter().enumerate() {
            result = result.with_metadata(&format!("warning_{}", i), warning);
        }
        Ok(result)
    }
}
