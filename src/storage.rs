//! SQLite-backed home of the final movie table.
//!
//! The loader owns the table: it is replaced wholesale on every run
//! (ensure, truncate, insert), each step committing on its own. Only one
//! pipeline run may write at a time; nothing here locks across runs.

use crate::error::{PipelineError, Result};
use crate::types::{ArtifactRef, EnrichedRecord, GenreVoteRow};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, Row};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SqliteStore {
    conn: Connection,
    database_path: PathBuf,
    table: String,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(database_path: P, table: &str) -> Result<Self> {
        let database_path = database_path.as_ref().to_path_buf();
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&database_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn,
            database_path,
            table: table.to_string(),
        })
    }

    /// Open an existing database without creating or changing anything.
    ///
    /// Fails with `MissingTable` when the file or the table is absent.
    pub fn open_existing<P: AsRef<Path>>(database_path: P, table: &str) -> Result<Self> {
        let database_path = database_path.as_ref().to_path_buf();
        let missing = || PipelineError::MissingTable {
            table: table.to_string(),
            database: database_path.display().to_string(),
        };
        if !database_path.is_file() {
            return Err(missing());
        }
        let conn = Connection::open_with_flags(&database_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn,
            database_path: database_path.clone(),
            table: table.to_string(),
        };
        if !store.table_exists()? {
            return Err(missing());
        }
        Ok(store)
    }

    pub fn table_exists(&self) -> Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |r| r.get(0),
        )?;
        Ok(found > 0)
    }

    /// Open the store a table artifact reference points at
    pub fn open_ref(artifact: &ArtifactRef) -> Result<Self> {
        let (db, table) = artifact.table_parts().ok_or_else(|| {
            PipelineError::Config(format!("'{}' is not a table reference", artifact))
        })?;
        Self::open(db, &table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn table_ref(&self) -> ArtifactRef {
        ArtifactRef::table(&self.database_path, &self.table)
    }

    /// Create the table if it does not exist. Safe to re-run.
    pub fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id            INTEGER PRIMARY KEY NOT NULL CHECK (id >= 0),
                title         TEXT,
                release_date  TEXT,
                vote_average  REAL CHECK (vote_average IS NULL OR vote_average >= 0),
                vote_count    INTEGER CHECK (vote_count IS NULL OR vote_count >= 0),
                popularity    REAL CHECK (popularity IS NULL OR popularity >= 0),
                runtime       REAL CHECK (runtime IS NULL OR runtime >= 0),
                genres        TEXT,
                cast_top3     TEXT
            );
            "#,
            table = self.table
        );
        self.conn.execute_batch(&sql)?;
        debug!("ensured table {}", self.table);
        Ok(())
    }

    /// Delete every row, returning how many were removed
    pub fn truncate(&self) -> Result<usize> {
        let deleted = self.conn.execute(&format!("DELETE FROM {}", self.table), [])?;
        info!("truncated {} ({} rows removed)", self.table, deleted);
        Ok(deleted)
    }

    /// Insert all rows in one transaction.
    ///
    /// A constraint violation aborts the batch with `LoadFailure`; the batch is
    /// rolled back but the earlier truncate stays committed.
    pub fn insert_all(&mut self, rows: &[EnrichedRecord]) -> Result<usize> {
        let table = self.table.clone();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (id, title, release_date, vote_average, vote_count,
                                 popularity, runtime, genres, cast_top3)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                table
            ))?;
            for (index, row) in rows.iter().enumerate() {
                let release_date = row.release_date.map(|d| d.format("%Y-%m-%d").to_string());
                let inserted = stmt.execute(params![
                    row.id,
                    row.title,
                    release_date,
                    row.vote_average,
                    row.vote_count,
                    row.popularity,
                    row.runtime,
                    row.genres,
                    row.cast_top3,
                ]);
                if let Err(e) = inserted {
                    warn!("insert into {} failed at row {} (id {}): {}", table, index, row.id, e);
                    return Err(PipelineError::LoadFailure {
                        table,
                        inserted: index,
                        message: format!("row with id {}: {}", row.id, e),
                    });
                }
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |r| r.get(0))?;
        Ok(count as usize)
    }

    /// Rows needed by the genre report
    pub fn fetch_genre_votes(&self) -> Result<Vec<GenreVoteRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, vote_average, vote_count, genres FROM {} ORDER BY id",
            self.table
        ))?;
        let rows = stmt
            .query_map([], |r| {
                Ok(GenreVoteRow {
                    id: r.get(0)?,
                    vote_average: r.get(1)?,
                    vote_count: r.get(2)?,
                    genres: r.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full table content ordered by id
    pub fn fetch_all(&self) -> Result<Vec<EnrichedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title, release_date, vote_average, vote_count,
                    popularity, runtime, genres, cast_top3
             FROM {} ORDER BY id",
            self.table
        ))?;
        let rows = stmt
            .query_map([], enriched_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Hex SHA-256 over the table content in id order; equal content gives equal
    /// fingerprints whatever the physical row order.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        for row in self.fetch_all()? {
            hasher.update(serde_json::to_vec(&row)?);
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn enriched_from_row(r: &Row<'_>) -> rusqlite::Result<EnrichedRecord> {
    let release_date: Option<String> = r.get(2)?;
    Ok(EnrichedRecord {
        id: r.get(0)?,
        title: r.get(1)?,
        release_date: release_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        vote_average: r.get(3)?,
        vote_count: r.get(4)?,
        popularity: r.get(5)?,
        runtime: r.get(6)?,
        genres: r.get(7)?,
        cast_top3: r.get(8)?,
    })
}
