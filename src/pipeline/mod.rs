// Movie pipeline: per-stage processing, step wrappers, dependency graph and scheduler

pub mod artifacts;
pub mod graph;
pub mod orchestrator;
pub mod processing;
pub mod steps;

pub use graph::PipelineGraph;
pub use orchestrator::{PipelineOrchestrator, RunReport, StepReport, StepStatus};
pub use steps::{PipelineStep, StepInputs, StepResult};
