//! Funding print and curve data model.
//!
//! A venue streams [`FundingPrint`]s, each quoting the predicted rate for one
//! upcoming 8-hour settlement window. The builder materialises eight
//! consecutive windows into [`BucketRecord`]s and hands them out as an
//! immutable [`CurveSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of 8-hour buckets in a complete curve (0-8h ... 56-64h).
pub const CURVE_BUCKETS: usize = 8;

/// Length of one funding window in hours.
pub const BUCKET_HOURS: u32 = 8;

/// Funding periods per year at the native 8-hour cadence (24 * 365 / 8).
pub const PERIODS_PER_YEAR: i32 = 24 * 365 / 8;

/// Compounds a raw 8-hour rate to a notional annual rate.
///
/// `(1 + r)^1095 - 1`, computed in double precision. A rate of exactly zero
/// annualises to exactly zero.
#[must_use]
pub fn annualise(raw_rate: f64) -> f64 {
    (1.0 + raw_rate).powi(PERIODS_PER_YEAR) - 1.0
}

/// One predicted-rate observation from a venue.
///
/// `predicted_rate` is optional so that malformed venue payloads still fit the
/// shape; the builder drops them instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingPrint {
    /// Venue identifier (e.g., "binance")
    pub venue: String,
    /// Instrument symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// When the quote was observed
    pub observed_at: DateTime<Utc>,
    /// Predicted 8-hour rate as a fraction (0.0001 = 0.01%)
    #[serde(default)]
    pub predicted_rate: Option<f64>,
    /// Settlement timestamp identifying the window this rate applies to
    pub settlement_at: DateTime<Utc>,
}

impl FundingPrint {
    /// Creates a new print.
    pub fn new(
        venue: impl Into<String>,
        symbol: impl Into<String>,
        observed_at: DateTime<Utc>,
        predicted_rate: Option<f64>,
        settlement_at: DateTime<Utc>,
    ) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
            observed_at,
            predicted_rate,
            settlement_at,
        }
    }
}

/// One materialised window inside a curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub horizon_start_h: u32,
    pub horizon_end_h: u32,
    pub raw_rate: f64,
    pub annualised_rate: f64,
    pub settlement_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
    pub venue: String,
}

impl BucketRecord {
    /// Materialises the record at curve position `position`.
    ///
    /// Horizon bounds derive from the position and the annualised rate is
    /// computed from `raw_rate` here, at read time.
    #[must_use]
    pub fn materialise(
        position: usize,
        venue: &str,
        raw_rate: f64,
        settlement_at: DateTime<Utc>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let start = position as u32 * BUCKET_HOURS;
        Self {
            horizon_start_h: start,
            horizon_end_h: start + BUCKET_HOURS,
            raw_rate,
            annualised_rate: annualise(raw_rate),
            settlement_at,
            observed_at,
            venue: venue.to_string(),
        }
    }
}

/// An immutable, complete eight-bucket curve.
///
/// Buckets are ordered by horizon: index `k` is the `k`-th nearest unresolved
/// settlement at emission time and starts at hour `8k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    venue: String,
    symbol: String,
    emitted_at: DateTime<Utc>,
    buckets: [BucketRecord; CURVE_BUCKETS],
}

impl CurveSnapshot {
    /// Builds a snapshot from exactly [`CURVE_BUCKETS`] records.
    ///
    /// Returns `None` unless there are exactly eight buckets, each sitting at
    /// the horizon its position implies, with strictly ascending settlements.
    #[must_use]
    pub fn from_buckets(
        venue: impl Into<String>,
        symbol: impl Into<String>,
        emitted_at: DateTime<Utc>,
        buckets: Vec<BucketRecord>,
    ) -> Option<Self> {
        let buckets: [BucketRecord; CURVE_BUCKETS] = buckets.try_into().ok()?;

        let positioned = buckets
            .iter()
            .enumerate()
            .all(|(k, b)| b.horizon_start_h == k as u32 * BUCKET_HOURS);
        let ascending = buckets
            .windows(2)
            .all(|pair| pair[0].settlement_at < pair[1].settlement_at);
        if !positioned || !ascending {
            return None;
        }

        Some(Self {
            venue: venue.into(),
            symbol: symbol.into(),
            emitted_at,
            buckets,
        })
    }

    #[must_use]
    pub fn venue(&self) -> &str {
        &self.venue
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Observation time of the print that triggered emission.
    #[must_use]
    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    #[must_use]
    pub fn buckets(&self) -> &[BucketRecord; CURVE_BUCKETS] {
        &self.buckets
    }

    /// Annualised rates in horizon order (`b[0]` = nearest window).
    #[must_use]
    pub fn annualised(&self) -> [f64; CURVE_BUCKETS] {
        std::array::from_fn(|k| self.buckets[k].annualised_rate)
    }

    /// Settlement of the nearest (0-8h) bucket.
    #[must_use]
    pub fn nearest_settlement(&self) -> DateTime<Utc> {
        self.buckets[0].settlement_at
    }

    /// Settlement of the furthest (56-64h) bucket.
    #[must_use]
    pub fn newest_settlement(&self) -> DateTime<Utc> {
        self.buckets[CURVE_BUCKETS - 1].settlement_at
    }

    /// Storage key: venue plus the settlement of the nearest bucket.
    #[must_use]
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.venue, self.nearest_settlement())
    }
}
