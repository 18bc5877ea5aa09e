//! Per-genre report over the loaded table.
//!
//! A movie counts once for each of its genre tags. The mean vote uses only
//! non-null vote averages and is rounded to two decimals, half away from zero.
//! Rows are ordered by count descending, then genre name ascending.

use crate::config::AggregateConfig;
use crate::constants::{REPORT_FILE, REPORT_HEADER};
use crate::error::Result;
use crate::pipeline::processing::nested_list::split_tags;
use crate::storage::SqliteStore;
use crate::types::{AggregateRow, ArtifactRef, GenreVoteRow};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[derive(Default)]
struct GenreAccumulator {
    movies: usize,
    vote_sum: f64,
    votes: usize,
}

/// Round to two decimals, ties away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn aggregate_genres(rows: &[GenreVoteRow], config: &AggregateConfig) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<&str, GenreAccumulator> = BTreeMap::new();

    for row in rows {
        if config.min_vote_count > 0 && row.vote_count.unwrap_or(0) < config.min_vote_count {
            continue;
        }
        let Some(genres) = row.genres.as_deref() else {
            continue;
        };
        // A repeated tag within one movie still counts that movie once
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for tag in split_tags(genres).filter(|tag| seen.insert(*tag)) {
            let acc = groups.entry(tag).or_default();
            acc.movies += 1;
            if let Some(vote) = row.vote_average {
                acc.vote_sum += vote;
                acc.votes += 1;
            }
        }
    }

    let mut report: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(genre, acc)| AggregateRow {
            genre: genre.to_string(),
            n_movies: acc.movies,
            avg_vote: (acc.votes > 0).then(|| round2(acc.vote_sum / acc.votes as f64)),
        })
        .collect();

    report.sort_by(|a, b| b.n_movies.cmp(&a.n_movies).then_with(|| a.genre.cmp(&b.genre)));
    if let Some(limit) = config.top_n {
        report.truncate(limit);
    }
    debug!("aggregated {} rows into {} genres", rows.len(), report.len());
    report
}

/// Write the report as CSV with header `genre,n_movies,avg_vote`
pub fn write_report(rows: &[AggregateRow], path: &Path) -> Result<ArtifactRef> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        let avg = row.avg_vote.map(|v| format!("{:.2}", v)).unwrap_or_default();
        writer.write_record([row.genre.as_str(), &row.n_movies.to_string(), &avg])?;
    }
    writer.flush()?;
    Ok(ArtifactRef::from_path(path))
}

/// Analyze stage: read the loaded table and write the report into `outputs_dir`
#[instrument(skip(config))]
pub fn analyze_table(
    table: &ArtifactRef,
    outputs_dir: &Path,
    config: &AggregateConfig,
) -> Result<(ArtifactRef, Vec<AggregateRow>)> {
    let store = SqliteStore::open_ref(table)?;
    let rows = store.fetch_genre_votes()?;
    let report = aggregate_genres(&rows, config);
    let artifact = write_report(&report, &outputs_dir.join(REPORT_FILE))?;
    info!("wrote {} genre rows from {} movies -> {}", report.len(), rows.len(), artifact);
    Ok((artifact, report))
}
