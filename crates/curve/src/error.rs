//! Reasons a print is dropped before it reaches window state.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a print failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// No predicted rate on the print
    MissingRate,
    /// Rate is NaN or infinite
    NonFiniteRate,
    /// `1 + rate` is not positive, so the rate cannot be compounded
    RateAtOrBelowMinusOne,
    /// Compounding to an annual rate overflows
    AnnualisedOverflow,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MissingRate => "missing predicted rate",
            Self::NonFiniteRate => "predicted rate is not finite",
            Self::RateAtOrBelowMinusOne => "predicted rate is at or below -1",
            Self::AnnualisedOverflow => "annualised rate overflows",
        };
        f.write_str(text)
    }
}

/// A print the builder refused. Always recovered locally: the window is left
/// untouched and nothing is emitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrintRejection {
    #[error("Invalid print: {reason}")]
    InvalidPrint { reason: InvalidReason },

    #[error("Stale print: settlement {settlement_at} precedes oldest retained {oldest_retained}")]
    StalePrint {
        settlement_at: DateTime<Utc>,
        oldest_retained: DateTime<Utc>,
    },

    #[error("Out-of-order print: settlement {settlement_at} is inside the window but not the newest ({newest_retained})")]
    OutOfOrder {
        settlement_at: DateTime<Utc>,
        newest_retained: DateTime<Utc>,
    },

    #[error("Print for venue {got} routed to the {expected} window")]
    VenueMismatch { expected: String, got: String },
}

impl PrintRejection {
    #[must_use]
    pub const fn invalid(reason: InvalidReason) -> Self {
        Self::InvalidPrint { reason }
    }
}
