use chrono::{DateTime, Utc};
use funding_curve_core::{BucketRecord, CurveSnapshot};
use serde::{Deserialize, Serialize};

/// One bucket of an emitted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub venue: String,
    pub symbol: String,
    pub emitted_at: DateTime<Utc>,
    pub horizon_start_h: u32,
    pub horizon_end_h: u32,
    pub raw_rate: f64,
    pub annualised_rate: f64,
    pub settlement_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl SnapshotRow {
    /// Flattens a snapshot into its eight bucket rows.
    #[must_use]
    pub fn from_snapshot(snapshot: &CurveSnapshot) -> Vec<Self> {
        snapshot
            .buckets()
            .iter()
            .map(|b| Self {
                venue: snapshot.venue().to_string(),
                symbol: snapshot.symbol().to_string(),
                emitted_at: snapshot.emitted_at(),
                horizon_start_h: b.horizon_start_h,
                horizon_end_h: b.horizon_end_h,
                raw_rate: b.raw_rate,
                annualised_rate: b.annualised_rate,
                settlement_at: b.settlement_at,
                observed_at: b.observed_at,
            })
            .collect()
    }

    #[must_use]
    pub fn to_bucket(&self) -> BucketRecord {
        BucketRecord {
            horizon_start_h: self.horizon_start_h,
            horizon_end_h: self.horizon_end_h,
            raw_rate: self.raw_rate,
            annualised_rate: self.annualised_rate,
            settlement_at: self.settlement_at,
            observed_at: self.observed_at,
            venue: self.venue.clone(),
        }
    }
}
