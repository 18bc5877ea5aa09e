use crate::constants;
use crate::error::{PipelineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";
const DEFAULT_DATABASE_FILE: &str = "warehouse.db";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the workspace; raw/bronze/silver/outputs live underneath
    pub data_dir: PathBuf,
    pub movies_file: String,
    pub credits_file: String,
    /// Defaults to `<data_dir>/warehouse.db`
    pub database_path: Option<PathBuf>,
    pub table: String,
    pub cast_top_n: usize,
    /// Defaults to `<data_dir>/logs`
    pub log_dir: Option<PathBuf>,
    pub aggregate: AggregateConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Movies below this vote count are left out of the report. 0 keeps everything.
    pub min_vote_count: i64,
    /// Keep only the first N report rows after ordering.
    pub top_n: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            movies_file: constants::MOVIES_INPUT_FILE.to_string(),
            credits_file: constants::CREDITS_INPUT_FILE.to_string(),
            database_path: None,
            table: constants::DEFAULT_TABLE.to_string(),
            cast_top_n: constants::DEFAULT_CAST_TOP_N,
            log_dir: None,
            aggregate: AggregateConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file (defaults when the file does not exist), then apply
    /// `TMDB_*` environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path).map_err(|e| {
                PipelineError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            toml::from_str::<PipelineConfig>(&content)?
        } else if path.is_some() {
            return Err(PipelineError::Config(format!(
                "Config file '{}' does not exist",
                config_path.display()
            )));
        } else {
            PipelineConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Workspace rooted at `data_dir` with the database stored inside it.
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("TMDB_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(db) = std::env::var("TMDB_DATABASE_PATH") {
            if !db.trim().is_empty() {
                self.database_path = Some(PathBuf::from(db));
            }
        }
        if let Ok(table) = std::env::var("TMDB_TABLE") {
            if !table.trim().is_empty() {
                self.table = table.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if !ident.is_match(&self.table) {
            return Err(PipelineError::Config(format!(
                "Invalid table name '{}'",
                self.table
            )));
        }
        if self.cast_top_n == 0 {
            return Err(PipelineError::Config("cast_top_n must be at least 1".to_string()));
        }
        if self.aggregate.top_n == Some(0) {
            return Err(PipelineError::Config(
                "aggregate.top_n must be at least 1 when set".to_string(),
            ));
        }
        if self.aggregate.min_vote_count < 0 {
            return Err(PipelineError::Config(
                "aggregate.min_vote_count cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_DATABASE_FILE))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_LOG_DIR))
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.data_dir.join("outputs")
    }

    pub fn movies_input(&self) -> PathBuf {
        self.raw_dir().join(&self.movies_file)
    }

    pub fn credits_input(&self) -> PathBuf {
        self.raw_dir().join(&self.credits_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table, "movies_final");
        assert_eq!(config.cast_top_n, 3);
        assert_eq!(config.movies_input(), PathBuf::from("data/raw/tmdb_5000_movies.csv"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            data_dir = "/srv/tmdb"
            [aggregate]
            min_vote_count = 50
            top_n = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/tmdb"));
        assert_eq!(config.table, "movies_final");
        assert_eq!(config.aggregate.min_vote_count, 50);
        assert_eq!(config.aggregate.top_n, Some(10));
        assert_eq!(config.bronze_dir(), PathBuf::from("/srv/tmdb/bronze"));
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut config = PipelineConfig::default();
        config.table = "movies; DROP TABLE x".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_top_n() {
        let mut config = PipelineConfig::default();
        config.aggregate.top_n = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_data_dir_puts_database_inside() {
        let config = PipelineConfig::with_data_dir("/tmp/run");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/run/warehouse.db"));
        assert_eq!(config.outputs_dir(), PathBuf::from("/tmp/run/outputs"));
    }

    #[test]
    fn test_database_and_logs_follow_data_dir_unless_set() {
        let derived: PipelineConfig = toml::from_str(r#"data_dir = "/srv/tmdb""#).unwrap();
        assert_eq!(derived.database_path(), PathBuf::from("/srv/tmdb/warehouse.db"));
        assert_eq!(derived.log_dir(), PathBuf::from("/srv/tmdb/logs"));

        let explicit: PipelineConfig = toml::from_str(
            r#"
            data_dir = "/srv/tmdb"
            database_path = "/var/db/movies.db"
            log_dir = "/var/log/tmdb"
            "#,
        )
        .unwrap();
        assert_eq!(explicit.database_path(), PathBuf::from("/var/db/movies.db"));
        assert_eq!(explicit.log_dir(), PathBuf::from("/var/log/tmdb"));
    }

    #[test]
    fn test_data_dir_env_override_moves_database() {
        std::env::set_var("TMDB_DATA_DIR", "/srv/from-env");
        let mut config = PipelineConfig::default();
        config.apply_env_overrides();
        std::env::remove_var("TMDB_DATA_DIR");

        assert_eq!(config.data_dir, PathBuf::from("/srv/from-env"));
        assert_eq!(config.database_path(), PathBuf::from("/srv/from-env/warehouse.db"));
        assert_eq!(config.log_dir(), PathBuf::from("/srv/from-env/logs"));
    }
}
