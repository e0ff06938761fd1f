//! File-backed storage for funding curves.
//!
//! This crate provides:
//! - CSV readers/writers for prints, snapshots and features
//! - Parquet export of snapshots
//! - Snapshot history rebuilt from the long-format store
//! - A versioned store for fitted PCA loadings

pub mod csv_storage;
pub mod history;
pub mod loadings_store;
pub mod models;
pub mod parquet_storage;

pub use csv_storage::CsvStorage;
pub use history::SnapshotHistory;
pub use loadings_store::{LoadingsStore, StoreError};
pub use models::{FeatureRow, PrintRow, SnapshotRow};
pub use parquet_storage::ParquetStorage;
