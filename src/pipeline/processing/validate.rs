//! Bronze stage: turn one raw CSV dataset into a cleaned artifact.
//!
//! Row-level problems never fail the stage. A bad numeric value becomes null,
//! a row without a usable identifier is dropped, and a repeated identifier
//! keeps only its first occurrence. Each case is counted in
//! [`ValidationStats`]. Only a missing identifier column is fatal.

use crate::constants::{self, CREDITS_ID_COLUMN, MOVIE_ID_COLUMN};
use crate::error::{PipelineError, Result};
use crate::pipeline::artifacts;
use crate::pipeline::processing::nested_list::flatten_names;
use crate::types::{ArtifactRef, CleanCredit, CleanMovie, RawRecord};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{error, info, instrument, warn};

/// Counters for one validation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub missing_id: usize,
    pub invalid_id: usize,
    pub duplicate_id: usize,
    pub malformed_rows: usize,
    pub null_filled: usize,
}

impl ValidationStats {
    pub fn rows_dropped(&self) -> usize {
        self.missing_id + self.invalid_id + self.duplicate_id + self.malformed_rows
    }
}

/// Dataset-specific cleaning rules
pub trait RecordCleaner {
    type Clean: Serialize;

    fn dataset(&self) -> &'static str;

    /// Column holding the identifier; its absence fails the whole stage
    fn id_column(&self) -> &'static str;

    /// Output columns, in the field order of `Self::Clean`
    fn columns(&self) -> &'static [&'static str];

    fn output_file(&self) -> &'static str;

    fn clean(&self, id: i64, raw: &RawRecord, stats: &mut ValidationStats) -> Self::Clean;
}

pub struct MovieCleaner;

const MOVIE_COLUMNS: [&str; 8] = [
    "id",
    "title",
    "release_date",
    "vote_average",
    "vote_count",
    "popularity",
    "runtime",
    "genres",
];

impl RecordCleaner for MovieCleaner {
    type Clean = CleanMovie;

    fn dataset(&self) -> &'static str {
        "movies"
    }

    fn id_column(&self) -> &'static str {
        MOVIE_ID_COLUMN
    }

    fn columns(&self) -> &'static [&'static str] {
        &MOVIE_COLUMNS
    }

    fn output_file(&self) -> &'static str {
        constants::MOVIES_BRONZE_FILE
    }

    fn clean(&self, id: i64, raw: &RawRecord, stats: &mut ValidationStats) -> CleanMovie {
        CleanMovie {
            id,
            title: raw.get("title").map(str::to_string),
            release_date: coerce_date(id, raw, "release_date", stats),
            vote_average: coerce_decimal(id, raw, "vote_average", stats),
            vote_count: coerce_count(id, raw, "vote_count", stats),
            popularity: coerce_decimal(id, raw, "popularity", stats),
            runtime: coerce_decimal(id, raw, "runtime", stats),
            genres: raw.get("genres").and_then(|g| flatten_names(g, None)),
        }
    }
}

pub struct CreditCleaner {
    pub cast_top_n: usize,
}

const CREDIT_COLUMNS: [&str; 3] = ["movie_id", "title", "cast_top3"];

impl RecordCleaner for CreditCleaner {
    type Clean = CleanCredit;

    fn dataset(&self) -> &'static str {
        "credits"
    }

    fn id_column(&self) -> &'static str {
        CREDITS_ID_COLUMN
    }

    fn columns(&self) -> &'static [&'static str] {
        &CREDIT_COLUMNS
    }

    fn output_file(&self) -> &'static str {
        constants::CREDITS_BRONZE_FILE
    }

    fn clean(&self, id: i64, raw: &RawRecord, _stats: &mut ValidationStats) -> CleanCredit {
        CleanCredit {
            movie_id: id,
            title: raw.get("title").map(str::to_string),
            cast_top3: raw
                .get("cast")
                .and_then(|c| flatten_names(c, Some(self.cast_top_n))),
        }
    }
}

/// Clean the dataset at `input` and write it into `output_dir`.
#[instrument(skip(cleaner, output_dir), fields(dataset = cleaner.dataset()))]
pub fn validate_dataset<C: RecordCleaner>(
    cleaner: &C,
    input: &Path,
    output_dir: &Path,
) -> Result<(ArtifactRef, ValidationStats)> {
    let file = File::open(input)?;
    let mut reader = csv::ReaderBuilder::new().from_reader(file);
    let headers = reader.headers()?.clone();
    let id_column = cleaner.id_column();
    if !headers.iter().any(|h| h.trim() == id_column) {
        return Err(PipelineError::SchemaMismatch {
            artifact: input.display().to_string(),
            column: id_column.to_string(),
        });
    }

    let mut stats = ValidationStats::default();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut cleaned = Vec::new();

    for (index, row) in reader.records().enumerate() {
        stats.rows_read += 1;
        // Line numbers are 1-based and the header takes line 1
        let line = index + 2;
        let record = match row {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: dropping malformed row at line {}: {}", cleaner.dataset(), line, e);
                stats.malformed_rows += 1;
                continue;
            }
        };
        let raw = RawRecord::from_pairs(headers.iter().zip(record.iter()));

        let id = match raw.get(id_column) {
            None => {
                error!("{}: row at line {} has no {}, dropped", cleaner.dataset(), line, id_column);
                stats.missing_id += 1;
                continue;
            }
            Some(value) => match parse_identifier(value) {
                Some(id) => id,
                None => {
                    error!(
                        "{}: row at line {} has invalid {} '{}', dropped",
                        cleaner.dataset(),
                        line,
                        id_column,
                        value
                    );
                    stats.invalid_id += 1;
                    continue;
                }
            },
        };

        if !seen.insert(id) {
            warn!(
                "{}: duplicate {} {} at line {}, keeping first occurrence",
                cleaner.dataset(),
                id_column,
                id,
                line
            );
            stats.duplicate_id += 1;
            continue;
        }

        cleaned.push(cleaner.clean(id, &raw, &mut stats));
    }
    stats.rows_kept = cleaned.len();

    let output = output_dir.join(cleaner.output_file());
    let artifact = artifacts::write_records(&output, cleaner.columns(), &cleaned)?;

    info!(
        "{}: kept {} of {} rows ({} dropped, {} fields null-filled) -> {}",
        cleaner.dataset(),
        stats.rows_kept,
        stats.rows_read,
        stats.rows_dropped(),
        stats.null_filled,
        artifact
    );
    Ok((artifact, stats))
}

/// Largest integer every smaller one of which an f64 holds exactly (2^53)
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Identifiers are non-negative integers; `"42.0"` is accepted as 42.
///
/// Float spellings are only accepted below 2^53, where the conversion is exact.
pub fn parse_identifier(value: &str) -> Option<i64> {
    if let Ok(id) = value.parse::<i64>() {
        return (id >= 0).then_some(id);
    }
    let f = value.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < MAX_EXACT_FLOAT_ID {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_decimal(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn coerce_decimal(
    id: i64,
    raw: &RawRecord,
    column: &str,
    stats: &mut ValidationStats,
) -> Option<f64> {
    let value = raw.get(column)?;
    let parsed = parse_decimal(value);
    if parsed.is_none() {
        warn!("id {}: {} '{}' is not a non-negative number, set to null", id, column, value);
        stats.null_filled += 1;
    }
    parsed
}

fn coerce_count(
    id: i64,
    raw: &RawRecord,
    column: &str,
    stats: &mut ValidationStats,
) -> Option<i64> {
    let value = raw.get(column)?;
    let parsed = parse_identifier(value);
    if parsed.is_none() {
        warn!("id {}: {} '{}' is not a non-negative integer, set to null", id, column, value);
        stats.null_filled += 1;
    }
    parsed
}

fn coerce_date(
    id: i64,
    raw: &RawRecord,
    column: &str,
    stats: &mut ValidationStats,
) -> Option<NaiveDate> {
    let value = raw.get(column)?;
    let parsed = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| value.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()));
    if parsed.is_none() {
        warn!("id {}: {} '{}' is not a date, set to null", id, column, value);
        stats.null_filled += 1;
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MOVIES_HEADER: &str =
        "id,title,genres,release_date,vote_average,vote_count,popularity,runtime";

    fn write_input(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_rows_without_identifier_are_dropped_and_counted() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "movies.csv",
            &format!(
                "{MOVIES_HEADER}\n\
                 1,Avatar,Action,2009-12-10,7.2,11800,150.4,162\n\
                 ,No Id,Drama,2010-01-01,5.0,10,1.0,90\n\
                 2,Spectre,Action,2015-10-26,6.3,4466,107.3,148\n\
                 ,Also No Id,Drama,,,,,\n"
            ),
        );

        let (artifact, stats) =
            validate_dataset(&MovieCleaner, &input, &dir.path().join("bronze")).unwrap();
        let rows: Vec<CleanMovie> = artifacts::read_records(&artifact, &["id"]).unwrap();

        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.missing_id, 2);
        assert_eq!(stats.rows_kept, 2);
        assert_eq!(rows.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_identifier_keeps_first_occurrence() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "movies.csv",
            &format!(
                "{MOVIES_HEADER}\n\
                 7,First,Drama,,6.0,10,1.0,100\n\
                 8,Other,Drama,,5.0,10,1.0,100\n\
                 7,Second,Comedy,,9.0,10,1.0,100\n"
            ),
        );

        let (artifact, stats) =
            validate_dataset(&MovieCleaner, &input, &dir.path().join("bronze")).unwrap();
        let rows: Vec<CleanMovie> = artifacts::read_records(&artifact, &["id"]).unwrap();

        assert_eq!(stats.duplicate_id, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title.as_deref(), Some("First"));
        assert_eq!(rows[0].vote_average, Some(6.0));
    }

    #[test]
    fn test_bad_numeric_fields_become_null() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "movies.csv",
            &format!(
                "{MOVIES_HEADER}\n\
                 3,Broken,Drama,not-a-date,abc,-5,NaN,\n"
            ),
        );

        let (artifact, stats) =
            validate_dataset(&MovieCleaner, &input, &dir.path().join("bronze")).unwrap();
        let rows: Vec<CleanMovie> = artifacts::read_records(&artifact, &["id"]).unwrap();

        assert_eq!(rows.len(), 1);
        let movie = &rows[0];
        assert_eq!(movie.release_date, None);
        assert_eq!(movie.vote_average, None);
        assert_eq!(movie.vote_count, None);
        assert_eq!(movie.popularity, None);
        assert_eq!(movie.runtime, None);
        // blank runtime is simply absent, not a coercion failure
        assert_eq!(stats.null_filled, 4);
    }

    #[test]
    fn test_invalid_identifiers_are_dropped() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "movies.csv",
            &format!("{MOVIES_HEADER}\nabc,Bad,,,,,,\n-4,Negative,,,,,,\n5.0,Float,,,,,,\n"),
        );

        let (artifact, stats) =
            validate_dataset(&MovieCleaner, &input, &dir.path().join("bronze")).unwrap();
        let rows: Vec<CleanMovie> = artifacts::read_records(&artifact, &["id"]).unwrap();

        assert_eq!(stats.invalid_id, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 5);
    }

    #[test]
    fn test_identifier_bounds() {
        assert_eq!(parse_identifier("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_identifier("9223372036854775808"), None);
        assert_eq!(parse_identifier("9223372036854775809"), None);
        assert_eq!(parse_identifier("9007199254740991.0"), Some(9_007_199_254_740_991));
        assert_eq!(parse_identifier("9007199254740992.0"), None);
        assert_eq!(parse_identifier("9007199254740993.0"), None);
        assert_eq!(parse_identifier("1e3"), Some(1000));
    }

    #[test]
    fn test_out_of_range_identifiers_are_not_merged_as_duplicates() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "movies.csv",
            &format!(
                "{MOVIES_HEADER}\n\
                 9223372036854775808,Over,,,,,,\n\
                 9223372036854775809,Further,,,,,,\n\
                 9007199254740993.0,Inexact,,,,,,\n"
            ),
        );

        let (artifact, stats) =
            validate_dataset(&MovieCleaner, &input, &dir.path().join("bronze")).unwrap();
        let rows: Vec<CleanMovie> = artifacts::read_records(&artifact, &["id"]).unwrap();

        assert!(rows.is_empty());
        assert_eq!(stats.invalid_id, 3);
        assert_eq!(stats.duplicate_id, 0);
    }

    #[test]
    fn test_credits_cast_is_flattened_to_top_three() {
        let dir = tempdir().unwrap();
        let cast =
            r#"[{""name"": ""A""}, {""name"": ""B""}, {""name"": ""C""}, {""name"": ""D""}]"#;
        let input = write_input(
            dir.path(),
            "credits.csv",
            &format!("movie_id,title,cast,crew\n19995,Avatar,\"{cast}\",[]\n"),
        );

        let (artifact, stats) =
            validate_dataset(&CreditCleaner { cast_top_n: 3 }, &input, &dir.path().join("bronze"))
                .unwrap();
        let rows: Vec<CleanCredit> = artifacts::read_records(&artifact, &["movie_id"]).unwrap();

        assert_eq!(stats.rows_kept, 1);
        assert_eq!(rows[0].cast_top3.as_deref(), Some("A,B,C"));
    }

    #[test]
    fn test_missing_identifier_column_is_fatal() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), "credits.csv", "title,cast\nAvatar,\"A,B\"\n");

        let err = validate_dataset(&CreditCleaner { cast_top_n: 3 }, &input, dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_raw_input_is_not_modified() {
        let dir = tempdir().unwrap();
        let content = format!("{MOVIES_HEADER}\n1,Avatar,Action,,7.2,1,1.0,100\n,x,,,,,,\n");
        let input = write_input(dir.path(), "movies.csv", &content);

        validate_dataset(&MovieCleaner, &input, &dir.path().join("bronze")).unwrap();
        assert_eq!(fs::read_to_string(&input).unwrap(), content);
    }
}
