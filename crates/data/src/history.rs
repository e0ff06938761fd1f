//! Rebuilds emitted curves from the long-format snapshot store.

use crate::csv_storage::CsvStorage;
use crate::models::SnapshotRow;
use anyhow::Result;
use chrono::{DateTime, Utc};
use funding_curve_core::{CurveSnapshot, CURVE_BUCKETS};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Time-ordered snapshots pivoted back from bucket rows.
///
/// Rows are grouped by `(venue, emitted_at)`. Within a group a later row for
/// the same horizon replaces an earlier one. Groups that do not form a
/// complete eight-bucket strip are dropped.
///
/// Two emissions from one venue that share an `emitted_at` (possible when
/// every accepted print emits and prints carry the same `observed_at`) are
/// treated as successive versions of one curve: the later strip, written in
/// full, replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHistory {
    snapshots: Vec<CurveSnapshot>,
}

impl SnapshotHistory {
    /// Loads and pivots the snapshot CSV at `path`.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened
    pub fn load(path: &str) -> Result<Self> {
        let history = Self::from_rows(CsvStorage::read_snapshot_rows(path)?);
        info!(path, snapshots = history.len(), "Loaded snapshot history");
        Ok(history)
    }

    #[must_use]
    pub fn from_rows(rows: Vec<SnapshotRow>) -> Self {
        let mut groups: BTreeMap<(String, DateTime<Utc>), BTreeMap<u32, SnapshotRow>> =
            BTreeMap::new();
        for row in rows {
            groups
                .entry((row.venue.clone(), row.emitted_at))
                .or_default()
                .insert(row.horizon_start_h, row);
        }

        let mut snapshots = Vec::with_capacity(groups.len());
        for ((venue, emitted_at), strip) in groups {
            let Some(symbol) = strip.values().next().map(|r| r.symbol.clone()) else {
                continue;
            };
            if strip.len() != CURVE_BUCKETS {
                debug!(%venue, %emitted_at, buckets = strip.len(), "Dropping incomplete strip");
                continue;
            }
            let buckets = strip.values().map(SnapshotRow::to_bucket).collect();
            match CurveSnapshot::from_buckets(&venue, &symbol, emitted_at, buckets) {
                Some(snapshot) => snapshots.push(snapshot),
                None => debug!(%venue, %emitted_at, "Dropping malformed strip"),
            }
        }

        snapshots.sort_by(|a, b| {
            a.emitted_at()
                .cmp(&b.emitted_at())
                .then_with(|| a.venue().cmp(b.venue()))
        });
        Self { snapshots }
    }

    #[must_use]
    pub fn snapshots(&self) -> &[CurveSnapshot] {
        &self.snapshots
    }

    pub fn for_venue<'a>(&'a self, venue: &'a str) -> impl Iterator<Item = &'a CurveSnapshot> {
        self.snapshots.iter().filter(move |s| s.venue() == venue)
    }

    /// Annualised curves as an `N x 8` matrix for fitting.
    #[must_use]
    pub fn matrix(&self) -> Vec<[f64; CURVE_BUCKETS]> {
        self.snapshots.iter().map(CurveSnapshot::annualised).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
