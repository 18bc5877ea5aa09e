//! Reading and writing the CSV artifacts exchanged between stages.
//!
//! Every artifact starts with a header row, so a reader can tell which columns
//! an upstream stage produced even when the file holds no data rows.

use crate::error::{PipelineError, Result};
use crate::types::ArtifactRef;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;
use tracing::debug;

/// Write `records` under `columns` and return the artifact location.
///
/// Data goes to a sibling temp file first and is renamed into place, so a
/// failed write never leaves a truncated artifact behind.
pub fn write_records<T: Serialize>(
    path: &Path,
    columns: &[&str],
    records: &[T],
) -> Result<ArtifactRef> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp_path)?;
        writer.write_record(columns)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    debug!("wrote {} records to {}", records.len(), path.display());
    Ok(ArtifactRef::from_path(path))
}

/// Read an artifact, failing with `SchemaMismatch` when a required column is absent.
pub fn read_records<T: DeserializeOwned>(
    artifact: &ArtifactRef,
    required_columns: &[&str],
) -> Result<Vec<T>> {
    let file = File::open(artifact.as_path())?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();
    for column in required_columns {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(PipelineError::SchemaMismatch {
                artifact: artifact.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
