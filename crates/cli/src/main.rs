use clap::{Parser, Subcommand};

mod commands;

use commands::{BuildFeaturesArgs, FitPcaArgs, ReplayArgs};

#[derive(Parser)]
#[command(name = "funding-curve")]
#[command(about = "Funding-rate term structure builder and factor extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded funding prints through the curve builder
    Replay(ReplayArgs),
    /// Fit and store a new PCA loadings version from stored snapshots
    FitPca(FitPcaArgs),
    /// Project stored snapshots against PCA loadings into the feature store
    BuildFeatures(BuildFeaturesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay(args) => {
            commands::run_replay(args).await?;
        }
        Commands::FitPca(args) => {
            commands::run_fit_pca(args).await?;
        }
        Commands::BuildFeatures(args) => {
            commands::run_build_features(args).await?;
        }
    }

    Ok(())
}
