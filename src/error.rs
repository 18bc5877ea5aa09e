use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An input artifact lacks a column the stage cannot work without.
    #[error("Schema mismatch in {artifact}: missing column '{column}'")]
    SchemaMismatch { artifact: String, column: String },

    /// The table was truncated but could not be fully repopulated.
    #[error("Load into {table} failed after {inserted} rows: {message}")]
    LoadFailure {
        table: String,
        inserted: usize,
        message: String,
    },

    #[error("Table '{table}' does not exist in {database}")]
    MissingTable { table: String, database: String },

    #[error("Step '{step}' is missing upstream artifact from '{upstream}'")]
    MissingArtifact { step: String, upstream: String },

    #[error("Invalid pipeline graph: {0}")]
    Graph(String),

    #[error("Step '{step}' did not complete: {message}")]
    StepAborted { step: String, message: String },
}

impl PipelineError {
    /// Structural errors end the run; row-level problems never reach this type.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SchemaMismatch { .. } => "schema_mismatch",
            PipelineError::LoadFailure { .. } => "load_failure",
            PipelineError::Io(_) => "io",
            PipelineError::Json(_) | PipelineError::Csv(_) => "format",
            PipelineError::Toml(_) | PipelineError::Config(_) => "config",
            PipelineError::Database(_) | PipelineError::MissingTable { .. } => "database",
            PipelineError::MissingArtifact { .. } | PipelineError::Graph(_) => "orchestration",
            PipelineError::StepAborted { .. } => "aborted",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
