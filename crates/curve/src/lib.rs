//! Rolling funding curve builder.
//!
//! One [`VenueCurve`] per venue keeps the eight nearest unresolved funding
//! windows, detects rolls, guards against bad prints and throttles emission of
//! complete [`CurveSnapshot`](funding_curve_core::CurveSnapshot)s.
//! [`CurveBook`] owns one window per venue for callers that route a mixed
//! stream.

pub mod book;
pub mod error;
pub mod stats;
pub mod window;

pub use book::CurveBook;
pub use error::{InvalidReason, PrintRejection};
pub use stats::BuilderStats;
pub use window::{VenueCurve, WindowState};
