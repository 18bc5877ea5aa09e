use super::{PipelineStep, StepInputs, StepResult};
use crate::constants::{STEP_LOAD, STEP_MERGE};
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::pipeline::processing::load_table;
use crate::storage::SqliteStore;
use crate::types::Stage;
use std::path::PathBuf;
use tracing::info;

/// Truncate-and-repopulate the movie table from the merged artifact
pub struct LoadStep {
    database_path: PathBuf,
    table: String,
}

impl LoadStep {
    pub fn new(database_path: PathBuf, table: String) -> Self {
        Self { database_path, table }
    }
}

impl PipelineStep for LoadStep {
    fn step_name(&self) -> &'static str {
        STEP_LOAD
    }

    fn stage(&self) -> Stage {
        Stage::Load
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![STEP_MERGE]
    }

    fn execute(&self, inputs: &StepInputs) -> Result<StepResult> {
        let enriched = inputs.artifact(STEP_MERGE)?;
        let mut store = SqliteStore::open(&self.database_path, &self.table)?;
        let report = load_table(&mut store, enriched)?;
        PipelineMetrics::record_load(report.rows_inserted);

        let message = format!("loaded {} rows into {}", report.rows_inserted, self.table);
        info!("✅ {}", message);
        Ok(StepResult::success(Some(report.table), report.rows_inserted, message)
            .with_metadata("rows_replaced", report.rows_deleted)
            .with_metadata("fingerprint", report.fingerprint))
    }
}
