//! fit-pca CLI command: fits and stores a new loadings version.

use super::load_config;
use anyhow::{bail, Context, Result};
use clap::Args;
use funding_curve_data::{LoadingsStore, SnapshotHistory};
use funding_curve_factors::{FitOptions, PcaError, PcaLoadings, PcaProjector};
use tracing::info;

/// Arguments for the fit-pca command.
#[derive(Args, Debug, Clone)]
pub struct FitPcaArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Config profile merged on top (reads Config.<profile>.toml)
    #[arg(long)]
    pub profile: Option<String>,

    /// Snapshot CSV to fit from (defaults to storage.snapshots_csv)
    #[arg(long)]
    pub snapshots: Option<String>,

    /// Fit on one venue's history only
    #[arg(long)]
    pub venue: Option<String>,

    /// Winsorisation threshold in standard deviations (overrides pca.winsorise_z)
    #[arg(long, conflicts_with = "no_winsorise")]
    pub winsorise_z: Option<f64>,

    /// Fit on the raw history without clipping
    #[arg(long)]
    pub no_winsorise: bool,
}

/// Runs the fit-pca command and prints the new version id to stdout.
///
/// # Errors
/// Returns an error if the history cannot be read, the fit fails, or the
/// loadings cannot be stored.
pub async fn run_fit_pca(args: FitPcaArgs) -> Result<()> {
    let config = load_config(&args.config, args.profile.as_deref())?;
    let snapshots_path = args
        .snapshots
        .unwrap_or_else(|| config.storage.snapshots_csv.clone());

    let winsorise_z = if args.no_winsorise {
        None
    } else {
        args.winsorise_z.or(config.pca.winsorise_z)
    };
    if let Some(z) = winsorise_z {
        if !(z.is_finite() && z > 0.0) {
            bail!("winsorise_z must be positive, got {}", z);
        }
    }
    let options = FitOptions { winsorise_z };

    let history = SnapshotHistory::load(&snapshots_path)?;
    let loadings = fit_history(&history, args.venue.as_deref(), &options)
        .with_context(|| format!("Failed to fit PCA on {}", snapshots_path))?;

    let path = LoadingsStore::new(&config.pca.loadings_dir).save(&loadings)?;

    info!(
        version_id = loadings.version_id(),
        n_samples = loadings.n_samples(),
        lambda1 = loadings.explained_variance()[0],
        lambda2 = loadings.explained_variance()[1],
        path = %path.display(),
        "Stored new PCA loadings"
    );
    println!("{}", loadings.version_id());
    Ok(())
}

/// Fits loadings on the stored history, optionally restricted to one venue.
pub(crate) fn fit_history(
    history: &SnapshotHistory,
    venue: Option<&str>,
    options: &FitOptions,
) -> Result<PcaLoadings, PcaError> {
    let matrix: Vec<_> = match venue {
        Some(venue) => history.for_venue(venue).map(|s| s.annualised()).collect(),
        None => history.matrix(),
    };
    PcaProjector::fit_with_options(&matrix, options)
}
