//! Static dependency graph of pipeline steps.
//!
//! Validated once at construction: unique names, known dependencies, no cycles.

use crate::config::PipelineConfig;
use crate::constants::{STEP_VALIDATE_CREDITS, STEP_VALIDATE_MOVIES};
use crate::error::{PipelineError, Result};
use crate::pipeline::steps::validate::Dataset;
use crate::pipeline::steps::{
    AnalyzeStep, CleanupStep, LoadStep, MergeStep, PipelineStep, ValidateStep,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Write;
use std::sync::Arc;

pub struct PipelineGraph {
    steps: Vec<Arc<dyn PipelineStep>>,
    /// Indices into `steps`, dependencies first
    order: Vec<usize>,
}

impl PipelineGraph {
    pub fn new(steps: Vec<Arc<dyn PipelineStep>>) -> Result<Self> {
        let mut index: HashMap<&'static str, usize> = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.step_name(), i).is_some() {
                return Err(PipelineError::Graph(format!(
                    "duplicate step name '{}'",
                    step.step_name()
                )));
            }
        }

        let mut in_degree = vec![0usize; steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
        for (i, step) in steps.iter().enumerate() {
            for dep in step.dependencies() {
                let Some(&d) = index.get(dep) else {
                    return Err(PipelineError::Graph(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.step_name(),
                        dep
                    )));
                };
                in_degree[i] += 1;
                dependents[d].push(i);
            }
        }

        // Kahn's algorithm; ties resolved by declaration order
        let mut ready: VecDeque<usize> = (0..steps.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(steps.len());
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &next in &dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }
        if order.len() != steps.len() {
            let stuck: Vec<&str> = (0..steps.len())
                .filter(|i| !order.contains(i))
                .map(|i| steps[i].step_name())
                .collect();
            return Err(PipelineError::Graph(format!(
                "dependency cycle among {}",
                stuck.join(", ")
            )));
        }

        Ok(Self { steps, order })
    }

    /// The movie pipeline: two validators feeding merge, then load, analyze, cleanup
    pub fn tmdb_default(config: &PipelineConfig) -> Result<Self> {
        let steps: Vec<Arc<dyn PipelineStep>> = vec![
            Arc::new(ValidateStep::new(
                STEP_VALIDATE_MOVIES,
                Dataset::Movies,
                config.movies_input(),
                config.bronze_dir(),
            )),
            Arc::new(ValidateStep::new(
                STEP_VALIDATE_CREDITS,
                Dataset::Credits {
                    cast_top_n: config.cast_top_n,
                },
                config.credits_input(),
                config.bronze_dir(),
            )),
            Arc::new(MergeStep::new(config.silver_dir())),
            Arc::new(LoadStep::new(config.database_path(), config.table.clone())),
            Arc::new(AnalyzeStep::new(config.outputs_dir(), config.aggregate.clone())),
            Arc::new(CleanupStep),
        ];
        Self::new(steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in a valid execution order
    pub fn ordered(&self) -> impl Iterator<Item = &Arc<dyn PipelineStep>> {
        self.order.iter().map(move |&i| &self.steps[i])
    }

    pub fn step(&self, name: &str) -> Option<&Arc<dyn PipelineStep>> {
        self.steps.iter().find(|s| s.step_name() == name)
    }

    /// Every step reachable upstream of `name`
    pub fn ancestors(&self, name: &str) -> BTreeSet<&'static str> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&'static str> = self
            .step(name)
            .map(|s| s.dependencies())
            .unwrap_or_default();
        while let Some(dep) = stack.pop() {
            if seen.insert(dep) {
                if let Some(step) = self.step(dep) {
                    stack.extend(step.dependencies());
                }
            }
        }
        seen
    }

    /// Human-readable listing for `show-graph`
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (position, step) in self.ordered().enumerate() {
            let deps = step.dependencies();
            let _ = writeln!(
                out,
                "{}. {} [{}] <- {}",
                position + 1,
                step.step_name(),
                step.stage(),
                if deps.is_empty() { "(none)".to_string() } else { deps.join(", ") }
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::steps::{StepInputs, StepResult};
    use crate::types::Stage;

    struct Node(&'static str, Vec<&'static str>);

    impl PipelineStep for Node {
        fn step_name(&self) -> &'static str {
            self.0
        }
        fn stage(&self) -> Stage {
            Stage::Bronze
        }
        fn dependencies(&self) -> Vec<&'static str> {
            self.1.clone()
        }
        fn execute(&self, _inputs: &StepInputs) -> Result<StepResult> {
            Ok(StepResult::default())
        }
    }

    fn node(name: &'static str, deps: &[&'static str]) -> Arc<dyn PipelineStep> {
        Arc::new(Node(name, deps.to_vec()))
    }

    #[test]
    fn test_default_graph_shape() {
        let graph = PipelineGraph::tmdb_default(&PipelineConfig::default()).unwrap();
        let order: Vec<&str> = graph.ordered().map(|s| s.step_name()).collect();
        assert_eq!(
            order,
            vec!["validate_movies", "validate_credits", "merge", "load", "analyze", "cleanup"]
        );
        let ancestors = graph.ancestors("cleanup");
        assert_eq!(ancestors.len(), 5);
        assert!(graph.ancestors("validate_movies").is_empty());
        assert_eq!(
            graph.step("merge").unwrap().dependencies(),
            vec!["validate_movies", "validate_credits"]
        );
    }

    #[test]
    fn test_order_respects_dependencies_regardless_of_declaration() {
        let graph = PipelineGraph::new(vec![
            node("c", &["b"]),
            node("b", &["a"]),
            node("a", &[]),
        ])
        .unwrap();
        let order: Vec<&str> = graph.ordered().map(|s| s.step_name()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rejects_cycle() {
        let err = PipelineGraph::new(vec![node("a", &["b"]), node("b", &["a"]), node("c", &[])])
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Graph(ref m) if m.contains("cycle")));
    }

    #[test]
    fn test_rejects_unknown_dependency_and_duplicates() {
        assert!(PipelineGraph::new(vec![node("a", &["ghost"])]).is_err());
        assert!(PipelineGraph::new(vec![node("a", &[]), node("a", &[])]).is_err());
    }

    #[test]
    fn test_describe_lists_every_step() {
        let graph = PipelineGraph::tmdb_default(&PipelineConfig::default()).unwrap();
        let text = graph.describe();
        assert_eq!(text.lines().count(), 6);
        assert!(text.contains("merge [silver] <- validate_movies, validate_credits"));
        assert!(text.contains("validate_movies [bronze] <- (none)"));
    }
}
