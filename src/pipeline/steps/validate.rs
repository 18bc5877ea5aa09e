use super::{PipelineStep, StepInputs, StepResult};
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::pipeline::processing::validate::{
    validate_dataset, CreditCleaner, MovieCleaner, RecordCleaner,
};
use crate::types::Stage;
use std::path::PathBuf;
use tracing::info;

/// Which raw dataset a validator instance cleans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Movies,
    Credits { cast_top_n: usize },
}

/// Bronze step. Reads its raw input from a fixed location, so it has no upstream.
pub struct ValidateStep {
    name: &'static str,
    dataset: Dataset,
    input: PathBuf,
    output_dir: PathBuf,
}

impl ValidateStep {
    pub fn new(name: &'static str, dataset: Dataset, input: PathBuf, output_dir: PathBuf) -> Self {
        Self { name, dataset, input, output_dir }
    }

    fn run<C: RecordCleaner>(&self, cleaner: &C) -> Result<StepResult> {
        let (artifact, stats) = validate_dataset(cleaner, &self.input, &self.output_dir)?;
        PipelineMetrics::record_validation(cleaner.dataset(), &stats);
        let message = format!(
            "{}: kept {} of {} rows",
            cleaner.dataset(),
            stats.rows_kept,
            stats.rows_read
        );
        info!("✅ {}", message);
        Ok(StepResult::success(Some(artifact), stats.rows_kept, message)
            .with_dropped(stats.rows_dropped())
            .with_warnings(stats.null_filled)
            .with_metadata("missing_id", stats.missing_id)
            .with_metadata("invalid_id", stats.invalid_id)
            .with_metadata("duplicate_id", stats.duplicate_id)
            .with_metadata("malformed_rows", stats.malformed_rows))
    }
}

impl PipelineStep for ValidateStep {
    fn step_name(&self) -> &'static str {
        self.name
    }

    fn stage(&self) -> Stage {
        Stage::Bronze
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }

    fn execute(&self, _inputs: &StepInputs) -> Result<StepResult> {
        match self.dataset {
            Dataset::Movies => self.run(&MovieCleaner),
            Dataset::Credits { cast_top_n } => self.run(&CreditCleaner { cast_top_n }),
        }
    }
}
