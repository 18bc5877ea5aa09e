use crate::constants::SQLITE_SCHEME;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline phase a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Bronze,
    Silver,
    Load,
    Analyze,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Bronze => "bronze",
            Stage::Silver => "silver",
            Stage::Load => "load",
            Stage::Analyze => "analyze",
            Stage::Cleanup => "cleanup",
        }
    }

    /// Stages whose outputs are scratch data, safe to delete once consumed
    pub fn is_intermediate(&self) -> bool {
        matches!(self, Stage::Bronze | Stage::Silver)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a stage output. This, never the data, is what moves between steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().to_string())
    }

    /// Reference to a relational table: `sqlite://<database path>#<table>`
    pub fn table(database_path: &Path, table: &str) -> Self {
        Self(format!("{}{}#{}", SQLITE_SCHEME, database_path.display(), table))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn is_table(&self) -> bool {
        self.0.starts_with(SQLITE_SCHEME)
    }

    /// Split a table reference into database path and table name
    pub fn table_parts(&self) -> Option<(PathBuf, String)> {
        let rest = self.0.strip_prefix(SQLITE_SCHEME)?;
        let (db, table) = rest.rsplit_once('#')?;
        if db.is_empty() || table.is_empty() {
            return None;
        }
        Some((PathBuf::from(db), table.to_string()))
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of an input dataset before any coercion
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v.to_string()))
            .collect();
        Self { fields }
    }

    /// Trimmed value, `None` when the column is absent or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Cleaned movie row (bronze output for the movies dataset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanMovie {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub runtime: Option<f64>,
    #[serde(default)]
    pub genres: Option<String>,
}

/// Cleaned credits row (bronze output for the credits dataset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanCredit {
    pub movie_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cast_top3: Option<String>,
}

/// Movie joined with the derived credits fields (silver output, table row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub runtime: Option<f64>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub cast_top3: Option<String>,
}

impl EnrichedRecord {
    pub fn from_movie(movie: CleanMovie, cast_top3: Option<String>) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            release_date: movie.release_date,
            vote_average: movie.vote_average,
            vote_count: movie.vote_count,
            popularity: movie.popularity,
            runtime: movie.runtime,
            genres: movie.genres,
            cast_top3,
        }
    }
}

/// Columns the aggregate report reads back from the table
#[derive(Debug, Clone, PartialEq)]
pub struct GenreVoteRow {
    pub id: i64,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub genres: Option<String>,
}

/// One line of the per-genre report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub genre: String,
    pub n_movies: usize,
    pub avg_vote: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_reference_round_trip() {
        let r = ArtifactRef::table(Path::new("/data/warehouse.db"), "movies_final");
        assert_eq!(r.as_str(), "sqlite:///data/warehouse.db#movies_final");
        assert!(r.is_table());
        let (db, table) = r.table_parts().unwrap();
        assert_eq!(db, PathBuf::from("/data/warehouse.db"));
        assert_eq!(table, "movies_final");
    }

    #[test]
    fn test_file_reference_is_not_a_table() {
        let r = ArtifactRef::new("/data/bronze/movies.csv");
        assert!(!r.is_table());
        assert!(r.table_parts().is_none());
        assert_eq!(r.as_path(), Path::new("/data/bronze/movies.csv"));
    }

    #[test]
    fn test_raw_record_blank_is_missing() {
        let raw = RawRecord::from_pairs([("id", "  "), ("title", " Avatar ")]);
        assert_eq!(raw.get("id"), None);
        assert_eq!(raw.get("title"), Some("Avatar"));
        assert_eq!(raw.get("genres"), None);
    }

    #[test]
    fn test_stage_intermediate() {
        assert!(Stage::Bronze.is_intermediate());
        assert!(Stage::Silver.is_intermediate());
        assert!(!Stage::Load.is_intermediate());
        assert!(!Stage::Analyze.is_intermediate());
    }
}
