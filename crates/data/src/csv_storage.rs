use crate::models::{FeatureRow, PrintRow, SnapshotRow};
use anyhow::{Context, Result};
use csv::{Reader, Writer, WriterBuilder};
use funding_curve_core::{CurveSnapshot, FundingPrint};
use funding_curve_factors::FeatureVector;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::{debug, warn};

pub struct CsvStorage;

impl CsvStorage {
    /// Reads funding prints from CSV.
    ///
    /// Format: venue,symbol,observed_at,predicted_rate,settlement_at
    ///
    /// Rows that cannot be parsed are logged and skipped. A blank or
    /// non-numeric rate is kept as a missing rate so the builder can count it.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened
    pub fn read_prints(path: &str) -> Result<Vec<FundingPrint>> {
        let mut reader = Reader::from_path(path)
            .with_context(|| format!("Failed to open prints CSV: {}", path))?;

        let mut prints = Vec::new();
        for (line, row) in reader.deserialize::<PrintRow>().enumerate() {
            match row {
                Ok(row) => prints.push(row.into_print()),
                Err(e) => warn!(path, line = line + 2, error = %e, "Skipping malformed print row"),
            }
        }

        debug!(path, count = prints.len(), "Read funding prints");
        Ok(prints)
    }

    /// Writes funding prints to a new CSV file, replacing any existing one.
    ///
    /// # Errors
    /// Returns error if file cannot be created or writing fails
    pub fn write_prints(path: &str, prints: &[FundingPrint]) -> Result<()> {
        ensure_parent(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path))?;
        let mut writer = Writer::from_writer(file);

        for print in prints {
            writer.serialize(PrintRow::from(print))?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Appends snapshots in long format, one row per bucket.
    ///
    /// Format: venue,symbol,emitted_at,horizon_start_h,horizon_end_h,
    /// raw_rate,annualised_rate,settlement_at,observed_at
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns error if file cannot be opened or writing fails
    pub fn append_snapshots(path: &str, snapshots: &[CurveSnapshot]) -> Result<usize> {
        let mut writer = appender(path)?;
        let mut rows = 0;

        for snapshot in snapshots {
            for row in SnapshotRow::from_snapshot(snapshot) {
                writer.serialize(row)?;
                rows += 1;
            }
        }

        writer.flush()?;
        Ok(rows)
    }

    /// Reads the long-format snapshot store row by row.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened
    pub fn read_snapshot_rows(path: &str) -> Result<Vec<SnapshotRow>> {
        let mut reader = Reader::from_path(path)
            .with_context(|| format!("Failed to open snapshots CSV: {}", path))?;

        let mut rows = Vec::new();
        for (line, row) in reader.deserialize::<SnapshotRow>().enumerate() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => warn!(path, line = line + 2, error = %e, "Skipping malformed snapshot row"),
            }
        }
        Ok(rows)
    }

    /// Appends feature vectors, one row per snapshot.
    ///
    /// Format: venue,settlement_at,emitted_at,loadings_version,level,slope,
    /// decay1,decay2,convexity,pc1,pc2
    ///
    /// # Errors
    /// Returns error if file cannot be opened or writing fails
    pub fn append_features(path: &str, features: &[FeatureVector]) -> Result<usize> {
        let mut writer = appender(path)?;

        for vector in features {
            writer.serialize(FeatureRow::from(vector))?;
        }

        writer.flush()?;
        Ok(features.len())
    }

    /// Reads feature vectors back, keeping undefined decay ratios undefined.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or a row cannot be parsed
    pub fn read_features(path: &str) -> Result<Vec<FeatureVector>> {
        let mut reader = Reader::from_path(path)
            .with_context(|| format!("Failed to open features CSV: {}", path))?;

        reader
            .deserialize::<FeatureRow>()
            .enumerate()
            .map(|(line, row)| {
                row.map_err(anyhow::Error::from)
                    .and_then(FeatureRow::into_vector)
                    .with_context(|| format!("Invalid feature row {} in {}", line + 2, path))
            })
            .collect()
    }
}

/// Opens `path` for appending, writing the header only when the file is new
/// or empty.
fn appender(path: &str) -> Result<Writer<File>> {
    ensure_parent(path)?;
    let has_rows = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open CSV file for append: {}", path))?;

    Ok(WriterBuilder::new().has_headers(!has_rows).from_writer(file))
}

fn ensure_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}
