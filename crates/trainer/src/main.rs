//! Churn Pipeline Build CLI
//!
//! Deterministic offline build producing a published artifact generation.

use anyhow::{Context, Result};
use churn_core::PipelineConfig;
use churn_trainer::build_pipeline;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "churn-train")]
#[command(author = "Churn Pipeline Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic churn model build", long_about = None)]
struct Args {
    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raw customer CSV, overrides paths.raw_data
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Artifact root, overrides paths.artifact_root
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for the stratified split
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out fraction for the stratified split
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Churn Pipeline Build v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let mut config = PipelineConfig::default();
            config
                .apply_env_overrides()
                .context("Invalid CHURN_* environment override")?;
            config
        }
    };
    if let Some(input) = args.input {
        config.paths.raw_data = input;
    }
    if let Some(output) = args.output {
        config.paths.artifact_root = output;
    }
    if let Some(seed) = args.seed {
        config.split.seed = seed;
    }
    if let Some(fraction) = args.test_fraction {
        config.split.test_fraction = fraction;
    }
    config.validate().context("Invalid configuration")?;

    info!("Build configuration:");
    info!("  Input: {}", config.paths.raw_data.display());
    info!("  Artifacts: {}", config.paths.artifact_root.display());
    info!("  Test fraction: {}", config.split.test_fraction);
    info!("  Seed: {}", config.split.seed);
    info!("  Max iterations: {}", config.training.max_iterations);

    let published = build_pipeline(&config).context("Pipeline build failed")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Build completed successfully");
    info!("  Build id: {}", published.build_id);
    info!("  Generation: {}", published.generation_dir.display());
    info!("  Model hash: {}", published.manifest.model_hash);

    Ok(())
}
