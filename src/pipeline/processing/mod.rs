// Stage logic, free of scheduling concerns. Steps in `pipeline::steps` wrap
// these for the orchestrator.

pub mod aggregate;
pub mod cleanup;
pub mod load;
pub mod merge;
pub mod nested_list;
pub mod validate;

pub use aggregate::{aggregate_genres, analyze_table, write_report};
pub use cleanup::{remove_artifacts, CleanupReport};
pub use merge::{left_join, merge_artifacts, MergeStats};
pub use validate::{validate_dataset, CreditCleaner, MovieCleaner, ValidationStats};
pub use load::{load_table, LoadReport};
