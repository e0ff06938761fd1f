//! Curve shape features.
//!
//! Turns one [`CurveSnapshot`] into level, slope, two decay ratios, a
//! curvature term and two principal-component scores.

use crate::error::{InvalidConvexityIndices, PcaError};
use crate::pca::{PcaLoadings, PcaProjector};
use chrono::{DateTime, Utc};
use funding_curve_core::{ConvexityIndices, CurveSnapshot, CURVE_BUCKETS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bucket-to-bucket ratio that may be undefined.
///
/// A zero denominator yields [`DecayRatio::Undefined`], which stays distinct
/// from a genuine ratio of zero all the way to storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DecayRatio {
    Value(f64),
    Undefined,
}

impl DecayRatio {
    #[must_use]
    pub fn between(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Self::Undefined
        } else {
            Self::Value(numerator / denominator)
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Undefined => None,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl fmt::Display for DecayRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

/// Features for one snapshot, keyed by venue and nearest settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub venue: String,
    /// Settlement of the nearest bucket
    pub settlement_at: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
    /// Loadings the PC scores were projected against
    pub loadings_version: String,
    pub level: f64,
    pub slope: f64,
    pub decay1: DecayRatio,
    pub decay2: DecayRatio,
    pub convexity: f64,
    pub pc1: f64,
    pub pc2: f64,
}

/// Extracts [`FeatureVector`]s with a fixed curvature definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor {
    convexity: ConvexityIndices,
}

impl FeatureExtractor {
    /// Creates an extractor computing `b[front] + b[tail] - 2 * b[mid]`.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is outside the curve or indices repeat.
    pub fn new(convexity: ConvexityIndices) -> Result<Self, InvalidConvexityIndices> {
        convexity
            .validate()
            .map_err(|e| InvalidConvexityIndices(e.to_string()))?;
        Ok(Self { convexity })
    }

    #[must_use]
    pub fn convexity_indices(&self) -> ConvexityIndices {
        self.convexity
    }

    /// Derives features from a snapshot and the loadings in effect.
    ///
    /// Pure: the snapshot is only read.
    ///
    /// # Errors
    ///
    /// Returns [`PcaError::InvalidVector`] if the curve holds non-finite
    /// rates; no partial vector is produced.
    pub fn extract(
        &self,
        snapshot: &CurveSnapshot,
        loadings: &PcaLoadings,
    ) -> Result<FeatureVector, PcaError> {
        let b = snapshot.annualised();
        let (pc1, pc2) = PcaProjector::project(&b, loadings)?;
        let ConvexityIndices { front, mid, tail } = self.convexity;

        Ok(FeatureVector {
            venue: snapshot.venue().to_string(),
            settlement_at: snapshot.nearest_settlement(),
            emitted_at: snapshot.emitted_at(),
            loadings_version: loadings.version_id().to_string(),
            level: b[0],
            slope: b[CURVE_BUCKETS - 1] - b[0],
            decay1: DecayRatio::between(b[1], b[0]),
            decay2: DecayRatio::between(b[2], b[1]),
            convexity: b[front] + b[tail] - 2.0 * b[mid],
            pc1,
            pc2,
        })
    }
}

/// Extracts features with the default curvature indices (2, 3, 5).
///
/// # Errors
///
/// See [`FeatureExtractor::extract`].
pub fn extract_features(
    snapshot: &CurveSnapshot,
    loadings: &PcaLoadings,
) -> Result<FeatureVector, PcaError> {
    FeatureExtractor::default().extract(snapshot, loadings)
}
