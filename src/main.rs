use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tmdb_pipeline::config::PipelineConfig;
use tmdb_pipeline::constants::{
    STEP_ANALYZE, STEP_CLEANUP, STEP_LOAD, STEP_MERGE, STEP_VALIDATE_CREDITS,
    STEP_VALIDATE_MOVIES,
};
use tmdb_pipeline::pipeline::{PipelineGraph, PipelineOrchestrator};
use tmdb_pipeline::{logging, metrics};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tmdb_pipeline")]
#[command(about = "Clean, merge, load and aggregate the TMDB movie datasets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the pipeline TOML config (default: ./pipeline.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the workspace directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole graph: validate, merge, load, analyze, cleanup
    Run,
    /// Create workspace directories and the target table
    Bootstrap,
    /// Clean the raw movies file into the bronze area
    ValidateMovies,
    /// Clean the raw credits file into the bronze area
    ValidateCredits,
    /// Join bronze movies and credits into the silver artifact
    Merge,
    /// Replace the table content with the silver artifact
    Load,
    /// Write the per-genre report from the loaded table
    Analyze,
    /// Delete bronze and silver artifacts
    Cleanup,
    /// Print the step graph in execution order
    ShowGraph,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    logging::init_logging(&config.log_dir());
    metrics::init_metrics();

    let orchestrator = PipelineOrchestrator::new(config);
    let single_step = match cli.command {
        Commands::Run => {
            let report = orchestrator.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                error!("Run {} failed", report.run_id);
                std::process::exit(1);
            }
            return Ok(());
        }
        Commands::Bootstrap => {
            orchestrator.bootstrap()?;
            println!("✅ Workspace ready at {}", orchestrator.config().data_dir.display());
            return Ok(());
        }
        Commands::ShowGraph => {
            let graph = PipelineGraph::tmdb_default(orchestrator.config())?;
            print!("{}", graph.describe());
            return Ok(());
        }
        Commands::ValidateMovies => STEP_VALIDATE_MOVIES,
        Commands::ValidateCredits => STEP_VALIDATE_CREDITS,
        Commands::Merge => STEP_MERGE,
        Commands::Load => STEP_LOAD,
        Commands::Analyze => STEP_ANALYZE,
        Commands::Cleanup => STEP_CLEANUP,
    };

    let result = orchestrator
        .run_step(single_step)
        .await
        .with_context(|| format!("step '{}' failed", single_step))?;
    info!("Step '{}' finished", single_step);
    println!("✅ {}: {}", single_step, result.message);
    if let Some(artifact) = &result.artifact {
        println!("   Output: {}", artifact);
    }
    println!(
        "   Processed: {}, dropped: {}, warnings: {}",
        result.processed_count, result.dropped_count, result.warning_count
    );
    Ok(())
}
