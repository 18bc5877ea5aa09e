use crate::constants::{self, CREDITS_ID_COLUMN, MOVIE_ID_COLUMN, TABLE_COLUMNS};
use crate::error::Result;
use crate::pipeline::artifacts;
use crate::types::{ArtifactRef, CleanCredit, CleanMovie, EnrichedRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeStats {
    pub movies: usize,
    pub credits: usize,
    pub matched: usize,
    pub movies_without_credits: usize,
    pub credits_dropped: usize,
}

/// Left outer join of movies with credits on the movie identifier.
///
/// Output follows movie order; every movie survives, credits with no movie are dropped.
pub fn left_join(
    movies: Vec<CleanMovie>,
    credits: Vec<CleanCredit>,
) -> (Vec<EnrichedRecord>, MergeStats) {
    let mut stats = MergeStats {
        movies: movies.len(),
        credits: credits.len(),
        ..MergeStats::default()
    };

    let mut cast_by_id: HashMap<i64, Option<String>> = HashMap::with_capacity(credits.len());
    for credit in credits {
        // Cleaned credits are unique per id; first one wins if a hand-made artifact is not
        cast_by_id.entry(credit.movie_id).or_insert(credit.cast_top3);
    }

    let movie_ids: HashSet<i64> = movies.iter().map(|m| m.id).collect();
    stats.credits_dropped = cast_by_id.keys().filter(|id| !movie_ids.contains(id)).count();

    let enriched: Vec<EnrichedRecord> = movies
        .into_iter()
        .map(|movie| {
            let cast = match cast_by_id.get(&movie.id) {
                Some(cast) => {
                    stats.matched += 1;
                    cast.clone()
                }
                None => {
                    stats.movies_without_credits += 1;
                    None
                }
            };
            EnrichedRecord::from_movie(movie, cast)
        })
        .collect();

    (enriched, stats)
}

/// Silver stage: join the two bronze artifacts into the enriched artifact.
///
/// Both inputs are checked for their join key before anything is written.
#[instrument(skip(output_dir))]
pub fn merge_artifacts(
    movies: &ArtifactRef,
    credits: &ArtifactRef,
    output_dir: &Path,
) -> Result<(ArtifactRef, MergeStats)> {
    let movie_rows: Vec<CleanMovie> = artifacts::read_records(movies, &[MOVIE_ID_COLUMN])?;
    let credit_rows: Vec<CleanCredit> = artifacts::read_records(credits, &[CREDITS_ID_COLUMN])?;

    let (enriched, stats) = left_join(movie_rows, credit_rows);

    let output = output_dir.join(constants::MERGED_SILVER_FILE);
    let artifact = artifacts::write_records(&output, &TABLE_COLUMNS, &enriched)?;
    info!(
        "merged {} movies with {} credits: {} matched, {} without credits, {} dropped -> {}",
        stats.movies,
        stats.credits,
        stats.matched,
        stats.movies_without_credits,
        stats.credits_dropped,
        artifact
    );
    Ok((artifact, stats))
}
