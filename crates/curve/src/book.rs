//! Multi-venue routing over independent [`VenueCurve`]s.

use crate::window::VenueCurve;
use funding_curve_core::{BuilderConfig, CurveSnapshot, FundingPrint};
use std::collections::HashMap;
use tracing::info;

/// Owns one [`VenueCurve`] per venue and routes prints by `print.venue`.
///
/// Venues never share state. A producer that wants to run venues in parallel
/// can [`take_venue`](Self::take_venue) a window and drive it from its own
/// task.
#[derive(Debug, Clone)]
pub struct CurveBook {
    emit_on_roll: bool,
    venues: HashMap<String, VenueCurve>,
}

impl Default for CurveBook {
    fn default() -> Self {
        Self::from_config(&BuilderConfig::default())
    }
}

impl CurveBook {
    #[must_use]
    pub fn new(emit_on_roll: bool) -> Self {
        Self {
            emit_on_roll,
            venues: HashMap::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(config.emit_on_roll)
    }

    /// Routes a print to its venue's window.
    ///
    /// A window is only created once a venue delivers a print it accepts.
    pub fn update(&mut self, print: &FundingPrint) -> Option<CurveSnapshot> {
        if let Some(curve) = self.venues.get_mut(&print.venue) {
            return curve.update(print);
        }

        let mut curve = VenueCurve::new(print.venue.clone(), self.emit_on_roll);
        let snapshot = curve.update(print);
        if !curve.is_empty() {
            self.venues.insert(print.venue.clone(), curve);
        }
        snapshot
    }

    /// Seeds every venue present in `prints` from its own history.
    ///
    /// Returns the number of accepted prints per venue.
    pub fn seed<I>(&mut self, prints: I) -> HashMap<String, usize>
    where
        I: IntoIterator<Item = FundingPrint>,
    {
        let mut by_venue: HashMap<String, Vec<FundingPrint>> = HashMap::new();
        for print in prints {
            by_venue.entry(print.venue.clone()).or_default().push(print);
        }

        by_venue
            .into_iter()
            .map(|(venue, history)| {
                let emit_on_roll = self.emit_on_roll;
                let curve = self
                    .venues
                    .entry(venue.clone())
                    .or_insert_with(|| VenueCurve::new(venue.clone(), emit_on_roll));
                let accepted = curve.seed(history);
                (venue, accepted)
            })
            .collect()
    }

    /// Clears one venue's state, or every venue when `venue` is `None`.
    pub fn reset(&mut self, venue: Option<&str>) {
        match venue {
            Some(venue) => {
                self.venues.remove(venue);
                info!(venue, "Reset curve window");
            }
            None => {
                self.venues.clear();
                info!("Reset all curve windows");
            }
        }
    }

    #[must_use]
    pub fn venue(&self, venue: &str) -> Option<&VenueCurve> {
        self.venues.get(venue)
    }

    /// Removes a venue's window so it can be driven independently.
    pub fn take_venue(&mut self, venue: &str) -> Option<VenueCurve> {
        self.venues.remove(venue)
    }

    /// Hands a window back (or adopts one built elsewhere).
    pub fn insert_venue(&mut self, curve: VenueCurve) {
        self.venues.insert(curve.venue().to_string(), curve);
    }

    pub fn venues(&self) -> impl Iterator<Item = &VenueCurve> {
        self.venues.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.venues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowState;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn settlement(k: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(8 * k)
    }

    fn print(venue: &str, k: i64, rate: Option<f64>) -> FundingPrint {
        FundingPrint::new(venue, "BTCUSDT", settlement(k), rate, settlement(k))
    }

    #[test]
    fn venues_fill_independently() {
        let mut book = CurveBook::new(true);
        for k in 0..8 {
            book.update(&print("binance", k, Some(0.0001)));
        }
        for k in 0..3 {
            book.update(&print("bybit", k, Some(0.0002)));
        }

        assert_eq!(book.len(), 2);
        assert_eq!(book.venue("binance").unwrap().state(), WindowState::Full);
        assert_eq!(book.venue("bybit").unwrap().state(), WindowState::Filling(3));
    }

    #[test]
    fn emission_is_scoped_to_the_venue() {
        let mut book = CurveBook::new(true);
        for k in 0..7 {
            book.update(&print("binance", k, Some(0.0001)));
            book.update(&print("bybit", k, Some(0.0001)));
        }

        let snapshot = book.update(&print("bybit", 7, Some(0.0001))).unwrap();

        assert_eq!(snapshot.venue(), "bybit");
        assert_eq!(book.venue("binance").unwrap().stats().emitted, 0);
    }

    #[test]
    fn invalid_first_print_creates_no_window() {
        let mut book = CurveBook::new(true);
        assert!(book.update(&print("okx", 0, None)).is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn reset_one_venue_leaves_others() {
        let mut book = CurveBook::new(true);
        book.update(&print("binance", 0, Some(0.0001)));
        book.update(&print("bybit", 0, Some(0.0001)));

        book.reset(Some("binance"));

        assert!(book.venue("binance").is_none());
        assert!(book.venue("bybit").is_some());

        book.reset(None);
        assert!(book.is_empty());
    }

    #[test]
    fn seed_groups_history_by_venue() {
        let mut book = CurveBook::new(true);
        let history: Vec<_> = (0..10)
            .map(|k| print("binance", k, Some(0.0001)))
            .chain((0..4).map(|k| print("bybit", k, Some(0.0001))))
            .collect();

        let accepted = book.seed(history);

        assert_eq!(accepted["binance"], 7);
        assert_eq!(accepted["bybit"], 4);
        assert!(book.update(&print("binance", 10, Some(0.0001))).is_some());
    }

    #[test]
    fn take_and_insert_round_trip_preserves_state() {
        let mut book = CurveBook::new(true);
        for k in 0..5 {
            book.update(&print("binance", k, Some(0.0001)));
        }

        let mut curve = book.take_venue("binance").unwrap();
        assert!(book.venue("binance").is_none());
        curve.update(&print("binance", 5, Some(0.0001)));
        book.insert_venue(curve);

        assert_eq!(book.venue("binance").unwrap().len(), 6);
    }
}
