//! Flat row shapes used by the file-backed stores.
//!
//! Snapshots are stored long (one row per bucket), features wide (one row per
//! snapshot). Both are append-only and keyed by venue plus the settlement of
//! the nearest bucket.

pub mod feature_row;
pub mod print_row;
pub mod snapshot_row;

pub use feature_row::FeatureRow;
pub use print_row::PrintRow;
pub use snapshot_row::SnapshotRow;
