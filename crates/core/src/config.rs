use crate::types::CURVE_BUCKETS;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub builder: BuilderConfig,
    pub pca: PcaConfig,
    pub features: FeatureConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Emit once per distinct newest settlement (true) or on every accepted
    /// print while the window is full (false)
    pub emit_on_roll: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaConfig {
    /// Directory holding one JSON file per loadings version
    pub loadings_dir: String,
    /// Loadings version to project against; newest when unset
    pub version_id: Option<String>,
    /// Clip each history column to mean +/- z standard deviations before fitting
    pub winsorise_z: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub convexity: ConvexityIndices,
}

/// Bucket indices used by the curvature feature:
/// `b[front] + b[tail] - 2 * b[mid]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvexityIndices {
    pub front: usize,
    pub mid: usize,
    pub tail: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub prints_csv: String,
    pub snapshots_csv: String,
    pub features_csv: String,
    pub snapshots_parquet: Option<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { emit_on_roll: true }
    }
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            loadings_dir: "storage/loadings".to_string(),
            version_id: None,
            winsorise_z: Some(5.0),
        }
    }
}

impl Default for ConvexityIndices {
    fn default() -> Self {
        Self {
            front: 2,
            mid: 3,
            tail: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prints_csv: "storage/raw/prints.csv".to_string(),
            snapshots_csv: "storage/processed/curve_snapshots.csv".to_string(),
            features_csv: "storage/processed/feature_store.csv".to_string(),
            snapshots_parquet: None,
        }
    }
}

impl ConvexityIndices {
    /// Checks that all three indices address a bucket and are distinct.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range or two indices coincide.
    pub fn validate(&self) -> Result<()> {
        for (name, index) in [("front", self.front), ("mid", self.mid), ("tail", self.tail)] {
            if index >= CURVE_BUCKETS {
                bail!("convexity.{name} = {index} is outside 0..{CURVE_BUCKETS}");
            }
        }
        if self.front == self.mid || self.mid == self.tail || self.front == self.tail {
            bail!(
                "convexity indices must be distinct (front={}, mid={}, tail={})",
                self.front,
                self.mid,
                self.tail
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validates values that serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.features.convexity.validate()?;
        if let Some(z) = self.pca.winsorise_z {
            if !z.is_finite() || z <= 0.0 {
                bail!("pca.winsorise_z must be a positive finite number, got {z}");
            }
        }
        Ok(())
    }
}
