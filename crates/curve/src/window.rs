//! Single-venue rolling window.
//!
//! Holds at most [`CURVE_BUCKETS`] windows, unique by settlement and ordered
//! ascending. Only the owning venue's producer mutates it, so no locking is
//! involved; every operation touches at most eight records.

use crate::error::{InvalidReason, PrintRejection};
use crate::stats::BuilderStats;
use chrono::{DateTime, Utc};
use funding_curve_core::{
    annualise, BucketRecord, BuilderConfig, CurveSnapshot, FundingPrint, CURVE_BUCKETS,
};
use std::collections::VecDeque;
use tracing::debug;

/// Raw quote retained for one settlement window. Annualisation happens when a
/// snapshot is materialised.
#[derive(Debug, Clone, PartialEq)]
struct WindowEntry {
    raw_rate: f64,
    settlement_at: DateTime<Utc>,
    observed_at: DateTime<Utc>,
}

/// Lifecycle of a venue window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Empty,
    /// Holding 1..=7 records
    Filling(usize),
    Full,
}

/// What an accepted print did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    /// A newer settlement was appended; `evicted` is true when the oldest
    /// record slid out to keep capacity
    Rolled { evicted: bool },
    /// The newest record's quote was replaced in place
    Refined,
}

/// Rolling curve window for one venue.
#[derive(Debug, Clone)]
pub struct VenueCurve {
    venue: String,
    symbol: Option<String>,
    emit_on_roll: bool,
    entries: VecDeque<WindowEntry>,
    last_emitted_settlement: Option<DateTime<Utc>>,
    stats: BuilderStats,
}

impl VenueCurve {
    /// Creates an empty window for `venue`.
    ///
    /// With `emit_on_roll` a snapshot is emitted once per distinct newest
    /// settlement; without it every accepted print on a full window emits.
    #[must_use]
    pub fn new(venue: impl Into<String>, emit_on_roll: bool) -> Self {
        Self {
            venue: venue.into(),
            symbol: None,
            emit_on_roll,
            entries: VecDeque::with_capacity(CURVE_BUCKETS + 1),
            last_emitted_settlement: None,
            stats: BuilderStats::default(),
        }
    }

    #[must_use]
    pub fn from_config(venue: impl Into<String>, config: &BuilderConfig) -> Self {
        Self::new(venue, config.emit_on_roll)
    }

    #[must_use]
    pub fn venue(&self) -> &str {
        &self.venue
    }

    #[must_use]
    pub fn emit_on_roll(&self) -> bool {
        self.emit_on_roll
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> WindowState {
        match self.entries.len() {
            0 => WindowState::Empty,
            n if n < CURVE_BUCKETS => WindowState::Filling(n),
            _ => WindowState::Full,
        }
    }

    /// Most recent newest-settlement for which a snapshot was emitted.
    #[must_use]
    pub fn last_emitted_settlement(&self) -> Option<DateTime<Utc>> {
        self.last_emitted_settlement
    }

    #[must_use]
    pub fn stats(&self) -> BuilderStats {
        self.stats
    }

    /// Retained settlements, oldest first.
    pub fn settlements(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.entries.iter().map(|e| e.settlement_at)
    }

    /// Retained raw rates, oldest first.
    pub fn raw_rates(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.raw_rate)
    }

    /// Pushes a print and returns a snapshot when one is due.
    ///
    /// Invalid, stale and out-of-order prints are dropped without touching
    /// the window.
    pub fn update(&mut self, print: &FundingPrint) -> Option<CurveSnapshot> {
        match self.try_update(print) {
            Ok(snapshot) => snapshot,
            Err(rejection) => {
                debug!(
                    venue = %self.venue,
                    settlement_at = %print.settlement_at,
                    %rejection,
                    "Dropped funding print"
                );
                None
            }
        }
    }

    /// Like [`update`](Self::update) but reports why a print was dropped.
    ///
    /// # Errors
    ///
    /// Returns the [`PrintRejection`] for a dropped print. The window is
    /// unchanged in that case.
    pub fn try_update(
        &mut self,
        print: &FundingPrint,
    ) -> Result<Option<CurveSnapshot>, PrintRejection> {
        self.ingest(print)?;
        Ok(self.emit(print.observed_at))
    }

    /// Pre-warms the window from historical prints without emitting.
    ///
    /// Prints for other venues are ignored. The rest are sorted by settlement
    /// and only the newest seven are applied, leaving the first live roll to
    /// complete the curve. Returns how many prints were accepted.
    pub fn seed<I>(&mut self, prints: I) -> usize
    where
        I: IntoIterator<Item = FundingPrint>,
    {
        let mut prints: Vec<FundingPrint> = prints
            .into_iter()
            .filter(|p| p.venue == self.venue)
            .collect();
        prints.sort_by_key(|p| p.settlement_at);

        let skip = prints.len().saturating_sub(CURVE_BUCKETS - 1);
        let accepted = prints[skip..]
            .iter()
            .filter(|p| self.ingest(p).is_ok())
            .count();

        debug!(venue = %self.venue, accepted, retained = self.len(), "Seeded curve window");
        accepted
    }

    /// Current curve if the window is full, without advancing the throttle.
    #[must_use]
    pub fn peek(&self) -> Option<CurveSnapshot> {
        let emitted_at = self.entries.iter().map(|e| e.observed_at).max()?;
        self.materialise(emitted_at)
    }

    /// Clears all window state for this venue.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.symbol = None;
        self.last_emitted_settlement = None;
        self.stats = BuilderStats::default();
    }

    fn ingest(&mut self, print: &FundingPrint) -> Result<Applied, PrintRejection> {
        if print.venue != self.venue {
            return Err(PrintRejection::VenueMismatch {
                expected: self.venue.clone(),
                got: print.venue.clone(),
            });
        }

        let rate = match validate_rate(print.predicted_rate) {
            Ok(rate) => rate,
            Err(reason) => {
                self.stats.invalid += 1;
                return Err(PrintRejection::invalid(reason));
            }
        };

        let bounds = self
            .entries
            .front()
            .zip(self.entries.back())
            .map(|(oldest, newest)| (oldest.settlement_at, newest.settlement_at));

        let applied = match bounds {
            Some((_, newest)) if print.settlement_at == newest => {
                if let Some(entry) = self.entries.back_mut() {
                    entry.raw_rate = rate;
                    entry.observed_at = print.observed_at;
                }
                self.stats.refinements += 1;
                Applied::Refined
            }
            Some((oldest, _)) if print.settlement_at < oldest => {
                self.stats.stale += 1;
                return Err(PrintRejection::StalePrint {
                    settlement_at: print.settlement_at,
                    oldest_retained: oldest,
                });
            }
            Some((_, newest)) if print.settlement_at < newest => {
                self.stats.out_of_order += 1;
                return Err(PrintRejection::OutOfOrder {
                    settlement_at: print.settlement_at,
                    newest_retained: newest,
                });
            }
            _ => {
                self.entries.push_back(WindowEntry {
                    raw_rate: rate,
                    settlement_at: print.settlement_at,
                    observed_at: print.observed_at,
                });
                let evicted = self.entries.len() > CURVE_BUCKETS;
                if evicted {
                    self.entries.pop_front();
                    self.stats.evictions += 1;
                }
                self.stats.rolls += 1;
                Applied::Rolled { evicted }
            }
        };

        self.symbol = Some(print.symbol.clone());
        Ok(applied)
    }

    fn emit(&mut self, emitted_at: DateTime<Utc>) -> Option<CurveSnapshot> {
        if self.entries.len() < CURVE_BUCKETS {
            return None;
        }
        let newest = self.entries.back()?.settlement_at;
        if self.emit_on_roll && self.last_emitted_settlement.is_some_and(|last| newest <= last) {
            return None;
        }

        let snapshot = self.materialise(emitted_at)?;
        self.last_emitted_settlement = Some(newest);
        self.stats.emitted += 1;
        debug!(
            venue = %self.venue,
            nearest = %snapshot.nearest_settlement(),
            newest = %newest,
            "Emitted curve snapshot"
        );
        Some(snapshot)
    }

    fn materialise(&self, emitted_at: DateTime<Utc>) -> Option<CurveSnapshot> {
        if self.entries.len() != CURVE_BUCKETS {
            return None;
        }
        let buckets = self
            .entries
            .iter()
            .enumerate()
            .map(|(k, e)| {
                BucketRecord::materialise(
                    k,
                    &self.venue,
                    e.raw_rate,
                    e.settlement_at,
                    e.observed_at,
                )
            })
            .collect();
        CurveSnapshot::from_buckets(
            self.venue.clone(),
            self.symbol.clone().unwrap_or_default(),
            emitted_at,
            buckets,
        )
    }
}

/// Gap guard: a rate must be present, finite, above -1 and compoundable.
fn validate_rate(rate: Option<f64>) -> Result<f64, InvalidReason> {
    let rate = rate.ok_or(InvalidReason::MissingRate)?;
    if !rate.is_finite() {
        return Err(InvalidReason::NonFiniteRate);
    }
    if rate <= -1.0 {
        return Err(InvalidReason::RateAtOrBelowMinusOne);
    }
    if !annualise(rate).is_finite() {
        return Err(InvalidReason::AnnualisedOverflow);
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn settlement(k: i64) -> DateTime<Utc> {
        t0() + Duration::hours(8 * k)
    }

    fn print(k: i64, rate: Option<f64>) -> FundingPrint {
        FundingPrint::new(
            "binance",
            "BTCUSDT",
            settlement(k) - Duration::hours(1),
            rate,
            settlement(k),
        )
    }

    fn filled(emit_on_roll: bool) -> VenueCurve {
        let mut curve = VenueCurve::new("binance", emit_on_roll);
        for k in 0..8 {
            curve.update(&print(k, Some(0.0001)));
        }
        curve
    }

    #[test]
    fn state_walks_empty_filling_full() {
        let mut curve = VenueCurve::new("binance", true);
        assert_eq!(curve.state(), WindowState::Empty);

        for k in 0..7 {
            assert!(curve.update(&print(k, Some(0.0001))).is_none());
            assert_eq!(curve.state(), WindowState::Filling(k as usize + 1));
        }

        assert!(curve.update(&print(7, Some(0.0001))).is_some());
        assert_eq!(curve.state(), WindowState::Full);
    }

    #[test]
    fn ninth_settlement_evicts_oldest() {
        let mut curve = filled(true);

        let result = curve.try_update(&print(8, Some(0.0002))).unwrap();

        assert!(result.is_some());
        assert_eq!(curve.len(), CURVE_BUCKETS);
        assert_eq!(curve.settlements().next(), Some(settlement(1)));
        assert_eq!(curve.settlements().last(), Some(settlement(8)));
        assert_eq!(curve.stats().evictions, 1);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut curve = VenueCurve::new("binance", false);
        for k in 0..40 {
            curve.update(&print(k, Some(0.0001)));
            assert!(curve.len() <= CURVE_BUCKETS);
        }
        assert_eq!(curve.stats().evictions, 32);
    }

    #[test]
    fn nan_rate_is_a_no_op() {
        let mut curve = filled(false);
        let before: Vec<_> = curve.raw_rates().collect();
        let stats_before = curve.stats();

        let result = curve.try_update(&print(8, Some(f64::NAN)));

        assert_eq!(
            result,
            Err(PrintRejection::invalid(InvalidReason::NonFiniteRate))
        );
        assert_eq!(curve.raw_rates().collect::<Vec<_>>(), before);
        assert_eq!(curve.settlements().last(), Some(settlement(7)));
        assert_eq!(curve.stats().emitted, stats_before.emitted);
        assert!(curve.update(&print(8, Some(f64::NAN))).is_none());
    }

    #[test]
    fn missing_rate_is_dropped() {
        let mut curve = VenueCurve::new("binance", true);
        assert_eq!(
            curve.try_update(&print(0, None)),
            Err(PrintRejection::invalid(InvalidReason::MissingRate))
        );
        assert!(curve.is_empty());
    }

    #[test]
    fn rate_at_or_below_minus_one_is_invalid() {
        let mut curve = VenueCurve::new("binance", true);
        for rate in [-1.0, -1.5] {
            assert_eq!(
                curve.try_update(&print(0, Some(rate))),
                Err(PrintRejection::invalid(InvalidReason::RateAtOrBelowMinusOne))
            );
        }
        assert!(curve.is_empty());
        assert_eq!(curve.stats().invalid, 2);
    }

    #[test]
    fn overflowing_rate_is_invalid() {
        let mut curve = VenueCurve::new("binance", true);
        assert_eq!(
            curve.try_update(&print(0, Some(10.0))),
            Err(PrintRejection::invalid(InvalidReason::AnnualisedOverflow))
        );
    }

    #[test]
    fn refinement_replaces_newest_in_place() {
        let mut curve = VenueCurve::new("binance", true);
        curve.update(&print(0, Some(0.0001)));
        curve.update(&print(1, Some(0.0001)));

        let mut better = print(1, Some(0.0004));
        better.observed_at += Duration::minutes(30);
        let applied = curve.ingest(&better).unwrap();

        assert_eq!(applied, Applied::Refined);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.raw_rates().collect::<Vec<_>>(), vec![0.0001, 0.0004]);
    }

    #[test]
    fn throttled_refinement_does_not_re_emit() {
        let mut curve = VenueCurve::new("binance", true);
        for k in 0..7 {
            curve.update(&print(k, Some(0.0001)));
        }

        assert!(curve.update(&print(7, Some(0.0001))).is_some());
        assert!(curve.update(&print(7, Some(0.0003))).is_none());
        assert_eq!(curve.last_emitted_settlement(), Some(settlement(7)));
        assert_eq!(curve.stats().emitted, 1);
    }

    #[test]
    fn unthrottled_emits_on_every_accepted_print() {
        let mut curve = filled(false);

        assert!(curve.update(&print(7, Some(0.0002))).is_some());
        assert!(curve.update(&print(7, Some(0.0003))).is_some());
        assert!(curve.update(&print(8, Some(0.0003))).is_some());
        // dropped prints never emit
        assert!(curve.update(&print(8, None)).is_none());
        assert!(curve.update(&print(0, Some(0.0001))).is_none());
    }

    #[test]
    fn unthrottled_snapshot_reflects_refinement() {
        let mut curve = filled(false);

        let snapshot = curve.update(&print(7, Some(0.0005))).unwrap();

        assert_eq!(snapshot.buckets()[7].raw_rate, 0.0005);
        assert_eq!(snapshot.buckets()[7].annualised_rate, annualise(0.0005));
    }

    #[test]
    fn stale_print_is_dropped() {
        let mut curve = VenueCurve::new("binance", true);
        for k in 3..6 {
            curve.update(&print(k, Some(0.0001)));
        }

        let result = curve.try_update(&print(1, Some(0.0002)));

        assert_eq!(
            result,
            Err(PrintRejection::StalePrint {
                settlement_at: settlement(1),
                oldest_retained: settlement(3),
            })
        );
        assert_eq!(curve.len(), 3);
        assert_eq!(curve.stats().stale, 1);
    }

    #[test]
    fn interior_settlement_is_out_of_order() {
        let mut curve = VenueCurve::new("binance", true);
        for k in 0..4 {
            curve.update(&print(k, Some(0.0001)));
        }

        let result = curve.try_update(&print(2, Some(0.0009)));

        assert!(matches!(result, Err(PrintRejection::OutOfOrder { .. })));
        assert_eq!(
            curve.raw_rates().collect::<Vec<_>>(),
            vec![0.0001, 0.0001, 0.0001, 0.0001]
        );
    }

    #[test]
    fn foreign_venue_is_rejected() {
        let mut curve = VenueCurve::new("bybit", true);
        let result = curve.try_update(&print(0, Some(0.0001)));
        assert!(matches!(result, Err(PrintRejection::VenueMismatch { .. })));
        assert!(curve.is_empty());
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let mut curve = filled(false);
        let snapshot = curve.peek().unwrap();

        curve.update(&print(8, Some(0.0009)));

        assert_eq!(snapshot.nearest_settlement(), settlement(0));
        assert_eq!(snapshot.buckets()[7].raw_rate, 0.0001);
    }

    #[test]
    fn snapshot_buckets_follow_horizon_order() {
        let curve = filled(true);
        let snapshot = curve.peek().unwrap();

        for (k, bucket) in snapshot.buckets().iter().enumerate() {
            assert_eq!(bucket.horizon_start_h, 8 * k as u32);
            assert_eq!(bucket.horizon_end_h, 8 * (k as u32 + 1));
            assert_eq!(bucket.settlement_at, settlement(k as i64));
            assert_eq!(bucket.venue, "binance");
        }
        assert_eq!(snapshot.symbol(), "BTCUSDT");
    }

    #[test]
    fn peek_does_not_advance_throttle() {
        let mut curve = VenueCurve::new("binance", true);
        for k in 0..7 {
            curve.update(&print(k, Some(0.0001)));
        }
        curve.ingest(&print(7, Some(0.0001))).unwrap();

        assert!(curve.peek().is_some());
        assert_eq!(curve.last_emitted_settlement(), None);
        assert!(curve.update(&print(7, Some(0.0001))).is_some());
    }

    #[test]
    fn seed_keeps_newest_seven_and_never_emits() {
        let mut curve = VenueCurve::new("binance", true);
        let history: Vec<_> = (0..12).rev().map(|k| print(k, Some(0.0001))).collect();

        let accepted = curve.seed(history);

        assert_eq!(accepted, 7);
        assert_eq!(curve.state(), WindowState::Filling(7));
        assert_eq!(curve.settlements().next(), Some(settlement(5)));
        assert_eq!(curve.stats().emitted, 0);

        // first live roll completes the curve
        assert!(curve.update(&print(12, Some(0.0001))).is_some());
    }

    #[test]
    fn seed_ignores_other_venues() {
        let mut curve = VenueCurve::new("bybit", true);
        let accepted = curve.seed((0..3).map(|k| print(k, Some(0.0001))));
        assert_eq!(accepted, 0);
        assert!(curve.is_empty());
    }

    #[test]
    fn reset_clears_window_and_throttle() {
        let mut curve = filled(true);
        assert!(curve.last_emitted_settlement().is_some());

        curve.reset();

        assert_eq!(curve.state(), WindowState::Empty);
        assert_eq!(curve.last_emitted_settlement(), None);
        assert_eq!(curve.stats(), BuilderStats::default());
    }
}
