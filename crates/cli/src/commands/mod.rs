//! CLI commands for the funding curve pipeline.

pub mod build_features;
pub mod fit_pca;
pub mod replay;

pub use build_features::{run_build_features, BuildFeaturesArgs};
pub use fit_pca::{run_fit_pca, FitPcaArgs};
pub use replay::{run_replay, ReplayArgs};

use anyhow::{Context, Result};
use funding_curve_core::{AppConfig, ConfigLoader};

/// Loads the config file, merging a profile file on top when one is given.
pub(crate) fn load_config(path: &str, profile: Option<&str>) -> Result<AppConfig> {
    match profile {
        Some(profile) => ConfigLoader::load_with_profile(path, profile),
        None => ConfigLoader::load(path),
    }
    .with_context(|| format!("Failed to load config from {}", path))
}
