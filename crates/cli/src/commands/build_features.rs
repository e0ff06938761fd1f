//! build-features CLI command: projects stored snapshots into feature rows.

use super::load_config;
use anyhow::{Context, Result};
use clap::Args;
use funding_curve_core::CurveSnapshot;
use funding_curve_data::{CsvStorage, LoadingsStore, SnapshotHistory};
use funding_curve_factors::{FeatureExtractor, FeatureVector, PcaLoadings};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Arguments for the build-features command.
#[derive(Args, Debug, Clone)]
pub struct BuildFeaturesArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Config profile merged on top (reads Config.<profile>.toml)
    #[arg(long)]
    pub profile: Option<String>,

    /// Snapshot CSV to read (defaults to storage.snapshots_csv)
    #[arg(long)]
    pub snapshots: Option<String>,

    /// Feature CSV to write (defaults to storage.features_csv)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Loadings version to project against (defaults to pca.version_id, then newest)
    #[arg(long)]
    pub loadings_version: Option<String>,

    /// Replace the output file instead of appending to it
    #[arg(long)]
    pub replace: bool,
}

/// Runs the build-features command.
///
/// # Errors
/// Returns an error if the config, snapshots or loadings cannot be read, or
/// the feature file cannot be written.
pub async fn run_build_features(args: BuildFeaturesArgs) -> Result<()> {
    let config = load_config(&args.config, args.profile.as_deref())?;
    let snapshots_path = args
        .snapshots
        .unwrap_or_else(|| config.storage.snapshots_csv.clone());
    let output = args
        .output
        .unwrap_or_else(|| config.storage.features_csv.clone());
    let version = args.loadings_version.or(config.pca.version_id);

    let history = SnapshotHistory::load(&snapshots_path)?;
    let loadings = LoadingsStore::new(&config.pca.loadings_dir)
        .resolve(version.as_deref())
        .context("Failed to resolve PCA loadings")?;
    let extractor = FeatureExtractor::new(config.features.convexity)?;

    let features = extract_all(&extractor, history.snapshots(), &loadings);

    if args.replace && Path::new(&output).exists() {
        fs::remove_file(&output)
            .with_context(|| format!("Failed to remove existing feature file: {}", output))?;
    }
    CsvStorage::append_features(&output, &features)?;

    info!(
        snapshots = history.len(),
        features = features.len(),
        loadings_version = loadings.version_id(),
        output = %output,
        "Built feature store"
    );
    Ok(())
}

/// Extracts features for every snapshot, skipping (and logging) any that fail.
pub(crate) fn extract_all(
    extractor: &FeatureExtractor,
    snapshots: &[CurveSnapshot],
    loadings: &PcaLoadings,
) -> Vec<FeatureVector> {
    snapshots
        .iter()
        .filter_map(|snapshot| match extractor.extract(snapshot, loadings) {
            Ok(features) => Some(features),
            Err(e) => {
                warn!(
                    venue = snapshot.venue(),
                    emitted_at = %snapshot.emitted_at(),
                    error = %e,
                    "Skipping snapshot without features"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use funding_curve_core::{BucketRecord, CURVE_BUCKETS};
    use funding_curve_factors::PcaProjector;

    fn snapshot(i: i64, rate: f64) -> CurveSnapshot {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::hours(8 * i);
        let buckets = (0..CURVE_BUCKETS)
            .map(|k| {
                let r = rate * (1.0 + 0.1 * ((i + k as i64) as f64).sin());
                BucketRecord::materialise(k, "binance", r, t0 + Duration::hours(8 * k as i64), t0)
            })
            .collect();
        CurveSnapshot::from_buckets("binance", "BTCUSDT", t0, buckets).unwrap()
    }

    #[test]
    fn every_valid_snapshot_yields_one_feature_row() {
        let snapshots: Vec<_> = (0..12).map(|i| snapshot(i, 0.0001)).collect();
        let history: Vec<_> = snapshots.iter().map(CurveSnapshot::annualised).collect();
        let loadings = PcaProjector::fit(&history).unwrap();

        let features = extract_all(&FeatureExtractor::default(), &snapshots, &loadings);

        assert_eq!(features.len(), snapshots.len());
        assert_eq!(features[3].settlement_at, snapshots[3].nearest_settlement());
    }
}
