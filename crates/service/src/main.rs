//! Churn Service CLI
//!
//! Scores hypothetical or listed customers against the live build,
//! rebuilding the pipeline first when no build has been published.

use anyhow::{Context, Result};
use churn_core::{ContractType, CustomerProfile, InternetService, PipelineConfig};
use churn_service::{ChurnService, RiskAssessment};
use churn_trainer::read_raw_csv;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "churn-service")]
#[command(about = "Churn risk scoring against the published pipeline build")]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Artifact root, overrides paths.artifact_root
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the pipeline and publish a new generation
    Build,

    /// Score one hypothetical customer
    Score {
        /// Months as a customer
        #[arg(long, default_value = "12")]
        tenure: u32,

        /// Monthly charges
        #[arg(long, default_value = "70.0")]
        monthly_charges: f64,

        /// Month-to-month, One year or Two year
        #[arg(long, default_value = "Month-to-month")]
        contract: ContractType,

        /// Fiber optic, DSL or No
        #[arg(long, default_value = "Fiber optic")]
        internet_service: InternetService,

        /// Paperless billing
        #[arg(long)]
        paperless_billing: bool,

        /// Senior citizen
        #[arg(long)]
        senior_citizen: bool,
    },

    /// Score every customer of a CSV file; the label column is optional
    ScoreBatch {
        /// Customer CSV
        input: PathBuf,
    },

    /// Total customers, churn rate and mean tenure
    Summary,

    /// Global feature importance of the live model
    Importance {
        /// Number of features to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Held-out metrics of the live model
    Metrics,

    /// Manifest of the live build
    Manifest,
}

#[derive(Serialize)]
struct BatchRow {
    row: usize,
    #[serde(flatten)]
    assessment: RiskAssessment,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
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
    if let Some(root) = cli.artifacts {
        config.paths.artifact_root = root;
    }
    config.validate().context("Invalid configuration")?;

    let service = ChurnService::new(config);

    match cli.command {
        Commands::Build => {
            let context = service.rebuild().context("Pipeline build failed")?;
            info!("✓ Published build {}", context.build_id());
        }
        Commands::Score {
            tenure,
            monthly_charges,
            contract,
            internet_service,
            paperless_billing,
            senior_citizen,
        } => {
            let profile = CustomerProfile {
                tenure,
                monthly_charges,
                contract,
                internet_service,
                paperless_billing,
                senior_citizen,
            };
            let assessment = service
                .score_profile(&profile)
                .context("Failed to score profile")?;
            print_json(&assessment)?;
        }
        Commands::ScoreBatch { input } => {
            let raw = read_raw_csv(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let rows: Vec<BatchRow> = service
                .score_batch(&raw)
                .context("Failed to score batch")?
                .into_iter()
                .enumerate()
                .map(|(row, assessment)| BatchRow { row, assessment })
                .collect();
            print_json(&rows)?;
        }
        Commands::Summary => {
            print_json(&service.summary().context("Failed to summarize dataset")?)?;
        }
        Commands::Importance { top } => {
            let importance = service.importance().context("Failed to load importance")?;
            print_json(&importance.top(top))?;
        }
        Commands::Metrics => {
            let metrics = service.metrics().context("Failed to load metrics")?;
            println!("{metrics}");
        }
        Commands::Manifest => {
            service.context().context("Failed to load the live build")?;
            let manifest = service
                .store()
                .load_manifest()
                .context("Failed to load manifest")?;
            print_json(&manifest)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}
