use crate::models::SnapshotRow;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMillisecondArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use funding_curve_core::CurveSnapshot;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::sync::Arc;

pub struct ParquetStorage;

impl ParquetStorage {
    /// Writes snapshots to a Parquet file, one row per bucket.
    ///
    /// Columns match the long-format snapshot CSV. Returns the row count.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or if writing to the Parquet file fails.
    pub fn write_snapshots(path: &str, snapshots: &[CurveSnapshot]) -> Result<usize> {
        let timestamp = || DataType::Timestamp(TimeUnit::Millisecond, None);
        let schema = Arc::new(Schema::new(vec![
            Field::new("venue", DataType::Utf8, false),
            Field::new("symbol", DataType::Utf8, false),
            Field::new("emitted_at", timestamp(), false),
            Field::new("horizon_start_h", DataType::UInt32, false),
            Field::new("horizon_end_h", DataType::UInt32, false),
            Field::new("raw_rate", DataType::Float64, false),
            Field::new("annualised_rate", DataType::Float64, false),
            Field::new("settlement_at", timestamp(), false),
            Field::new("observed_at", timestamp(), false),
        ]));

        let rows: Vec<SnapshotRow> = snapshots.iter().flat_map(SnapshotRow::from_snapshot).collect();

        let venues = StringArray::from(rows.iter().map(|r| r.venue.clone()).collect::<Vec<_>>());
        let symbols = StringArray::from(rows.iter().map(|r| r.symbol.clone()).collect::<Vec<_>>());
        let emitted = TimestampMillisecondArray::from(
            rows.iter()
                .map(|r| r.emitted_at.timestamp_millis())
                .collect::<Vec<_>>(),
        );
        let starts = UInt32Array::from(rows.iter().map(|r| r.horizon_start_h).collect::<Vec<_>>());
        let ends = UInt32Array::from(rows.iter().map(|r| r.horizon_end_h).collect::<Vec<_>>());
        let raw = Float64Array::from(rows.iter().map(|r| r.raw_rate).collect::<Vec<_>>());
        let annualised =
            Float64Array::from(rows.iter().map(|r| r.annualised_rate).collect::<Vec<_>>());
        let settlements = TimestampMillisecondArray::from(
            rows.iter()
                .map(|r| r.settlement_at.timestamp_millis())
                .collect::<Vec<_>>(),
        );
        let observed = TimestampMillisecondArray::from(
            rows.iter()
                .map(|r| r.observed_at.timestamp_millis())
                .collect::<Vec<_>>(),
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(venues) as ArrayRef,
                Arc::new(symbols) as ArrayRef,
                Arc::new(emitted) as ArrayRef,
                Arc::new(starts) as ArrayRef,
                Arc::new(ends) as ArrayRef,
                Arc::new(raw) as ArrayRef,
                Arc::new(annualised) as ArrayRef,
                Arc::new(settlements) as ArrayRef,
                Arc::new(observed) as ArrayRef,
            ],
        )?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create Parquet file: {}", path))?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(rows.len())
    }
}
