use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tmdb_pipeline::config::PipelineConfig;
use tmdb_pipeline::storage::SqliteStore;

/// Print the row count, content fingerprint and first rows of the movie table
#[derive(Parser)]
#[command(name = "inspect-table")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of rows to show
    #[arg(long, default_value_t = 5)]
    limit: usize,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let config = PipelineConfig::load(args.config.as_deref())?;

    let database_path = config.database_path();
    let store = SqliteStore::open_existing(&database_path, &config.table)
        .with_context(|| format!("inspecting {}", database_path.display()))?;

    println!("📦 {}", store.table_ref());
    println!("   Rows: {}", store.row_count()?);
    println!("   Fingerprint: {}", store.fingerprint()?);
    for row in store.fetch_all()?.into_iter().take(args.limit) {
        println!("   {}", serde_json::to_string(&row)?);
    }
    Ok(())
}
