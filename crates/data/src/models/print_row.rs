use chrono::{DateTime, Utc};
use funding_curve_core::FundingPrint;
use serde::{Deserialize, Serialize};

/// Raw print as delivered by a venue collector or a historical dump.
///
/// The rate is kept as text so an empty or unparseable value maps to a
/// missing rate instead of failing the whole row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRow {
    pub venue: String,
    pub symbol: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub predicted_rate: Option<String>,
    pub settlement_at: DateTime<Utc>,
}

impl PrintRow {
    #[must_use]
    pub fn into_print(self) -> FundingPrint {
        let rate = self
            .predicted_rate
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok());
        FundingPrint::new(
            self.venue,
            self.symbol,
            self.observed_at,
            rate,
            self.settlement_at,
        )
    }
}

impl From<&FundingPrint> for PrintRow {
    fn from(print: &FundingPrint) -> Self {
        Self {
            venue: print.venue.clone(),
            symbol: print.symbol.clone(),
            observed_at: print.observed_at,
            predicted_rate: print.predicted_rate.map(|r| r.to_string()),
            settlement_at: print.settlement_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(rate: Option<&str>) -> PrintRow {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PrintRow {
            venue: "bybit".to_string(),
            symbol: "BTCUSDT".to_string(),
            observed_at: t,
            predicted_rate: rate.map(str::to_string),
            settlement_at: t,
        }
    }

    #[test]
    fn numeric_rate_is_parsed() {
        assert_eq!(row(Some("0.0001")).into_print().predicted_rate, Some(0.0001));
    }

    #[test]
    fn blank_or_garbage_rate_is_missing() {
        assert_eq!(row(None).into_print().predicted_rate, None);
        assert_eq!(row(Some("  ")).into_print().predicted_rate, None);
        assert_eq!(row(Some("n/a")).into_print().predicted_rate, None);
    }

    #[test]
    fn nan_text_reaches_the_builder_as_nan() {
        let rate = row(Some("NaN")).into_print().predicted_rate.unwrap();
        assert!(rate.is_nan());
    }
}
