use crate::constants::MOVIE_ID_COLUMN;
use crate::error::Result;
use crate::pipeline::artifacts;
use crate::storage::SqliteStore;
use crate::types::{ArtifactRef, EnrichedRecord};
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub table: ArtifactRef,
    pub rows_deleted: usize,
    pub rows_inserted: usize,
    pub fingerprint: String,
}

/// Replace the table content with the enriched artifact.
///
/// Ensure, truncate and insert each commit separately. If the insert fails the
/// table stays truncated; there is no return to the previous snapshot.
#[instrument(skip(store), fields(table = store.table()))]
pub fn load_table(store: &mut SqliteStore, enriched: &ArtifactRef) -> Result<LoadReport> {
    // Read first so a bad artifact never costs the existing table
    let rows: Vec<EnrichedRecord> = artifacts::read_records(enriched, &[MOVIE_ID_COLUMN])?;

    store.ensure_table()?;
    let rows_deleted = store.truncate()?;
    let rows_inserted = store.insert_all(&rows)?;
    let fingerprint = store.fingerprint()?;

    info!(
        "loaded {} rows into {} (replaced {}), fingerprint {}",
        rows_inserted,
        store.table(),
        rows_deleted,
        &fingerprint[..12]
    );
    Ok(LoadReport {
        table: store.table_ref(),
        rows_deleted,
        rows_inserted,
        fingerprint,
    })
}
