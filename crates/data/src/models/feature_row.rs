use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use funding_curve_factors::{DecayRatio, FeatureVector};
use serde::{Deserialize, Serialize};

/// Text marker written for an undefined decay ratio.
pub const UNDEFINED_MARKER: &str = "undefined";

/// One feature vector per snapshot.
///
/// Decay ratios are stored as text so an undefined ratio is written as
/// [`UNDEFINED_MARKER`] rather than a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub venue: String,
    pub settlement_at: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
    pub loadings_version: String,
    pub level: f64,
    pub slope: f64,
    pub decay1: String,
    pub decay2: String,
    pub convexity: f64,
    pub pc1: f64,
    pub pc2: f64,
}

impl From<&FeatureVector> for FeatureRow {
    fn from(v: &FeatureVector) -> Self {
        Self {
            venue: v.venue.clone(),
            settlement_at: v.settlement_at,
            emitted_at: v.emitted_at,
            loadings_version: v.loadings_version.clone(),
            level: v.level,
            slope: v.slope,
            decay1: v.decay1.to_string(),
            decay2: v.decay2.to_string(),
            convexity: v.convexity,
            pc1: v.pc1,
            pc2: v.pc2,
        }
    }
}

impl FeatureRow {
    /// Parses the row back into a feature vector.
    ///
    /// # Errors
    ///
    /// Returns an error if a decay column is neither a number nor the
    /// undefined marker.
    pub fn into_vector(self) -> Result<FeatureVector> {
        Ok(FeatureVector {
            decay1: parse_ratio(&self.decay1)?,
            decay2: parse_ratio(&self.decay2)?,
            venue: self.venue,
            settlement_at: self.settlement_at,
            emitted_at: self.emitted_at,
            loadings_version: self.loadings_version,
            level: self.level,
            slope: self.slope,
            convexity: self.convexity,
            pc1: self.pc1,
            pc2: self.pc2,
        })
    }
}

fn parse_ratio(text: &str) -> Result<DecayRatio> {
    if text == UNDEFINED_MARKER {
        return Ok(DecayRatio::Undefined);
    }
    text.parse::<f64>()
        .map(DecayRatio::Value)
        .map_err(|e| anyhow!("invalid decay ratio {text:?}: {e}"))
}
