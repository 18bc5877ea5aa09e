use crate::error::{PipelineError, Result};
use crate::types::{ArtifactRef, Stage};
use std::collections::BTreeMap;

/// Common trait for all pipeline steps
///
/// A step is a run-to-completion unit of blocking work. It receives only the
/// artifact locations of the steps upstream of it and returns its own.
pub trait PipelineStep: Send + Sync {
    /// Unique name of this step within the graph
    fn step_name(&self) -> &'static str;

    fn stage(&self) -> Stage;

    /// Steps that must succeed before this one may start
    fn dependencies(&self) -> Vec<&'static str>;

    fn execute(&self, inputs: &StepInputs) -> Result<StepResult>;
}

/// Artifact produced by a completed upstream step
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamArtifact {
    pub stage: Stage,
    pub artifact: ArtifactRef,
}

/// Artifacts of every (transitive) upstream step, keyed by step name
#[derive(Debug, Clone, Default)]
pub struct StepInputs {
    step: String,
    upstream: BTreeMap<String, UpstreamArtifact>,
}

impl StepInputs {
    pub fn new(step: &str) -> Self {
        Self {
            step: step.to_string(),
            upstream: BTreeMap::new(),
        }
    }

    pub fn with_artifact(mut self, upstream: &str, stage: Stage, artifact: ArtifactRef) -> Self {
        self.upstream
            .insert(upstream.to_string(), UpstreamArtifact { stage, artifact });
        self
    }

    pub fn artifact(&self, upstream: &str) -> Result<&ArtifactRef> {
        self.upstream
            .get(upstream)
            .map(|u| &u.artifact)
            .ok_or_else(|| PipelineError::MissingArtifact {
                step: self.step.clone(),
                upstream: upstream.to_string(),
            })
    }

    /// Upstream outputs from bronze and silver stages
    pub fn intermediates(&self) -> Vec<ArtifactRef> {
        self.upstream
            .values()
            .filter(|u| u.stage.is_intermediate())
            .map(|u| u.artifact.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }
}

/// Result of executing a pipeline step
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub artifact: Option<ArtifactRef>,
    pub processed_count: usize,
    pub dropped_count: usize,
    pub warning_count: usize,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl StepResult {
    pub fn success(artifact: Option<ArtifactRef>, processed: usize, message: String) -> Self {
        Self {
            artifact,
            processed_count: processed,
            message,
            ..Self::default()
        }
    }

    pub fn with_dropped(mut self, dropped: usize) -> Self {
        self.dropped_count = dropped;
        self
    }

    pub fn with_warnings(mut self, warnings: usize) -> Self {
        self.warning_count = warnings;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

pub mod analyze;
pub mod cleanup;
pub mod load;
pub mod merge;
pub mod validate;

pub use analyze::AnalyzeStep;
pub use cleanup::CleanupStep;
pub use load::LoadStep;
pub use merge::MergeStep;
pub use validate::ValidateStep;
