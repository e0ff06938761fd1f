//! replay CLI command: drives the curve builder over recorded prints.
//!
//! Each venue gets its own task owning a `VenueCurve`. Prints reach it over an
//! mpsc channel in file order and emitted snapshots flow into a single sink.

use super::build_features::extract_all;
use super::load_config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use funding_curve_builder::{BuilderStats, VenueCurve};
use funding_curve_core::{BuilderConfig, CurveSnapshot, FundingPrint};
use funding_curve_data::{CsvStorage, LoadingsStore, ParquetStorage, StoreError};
use funding_curve_factors::FeatureExtractor;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const CHANNEL_SIZE: usize = 1024;

/// Arguments for the replay command.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Config profile merged on top (reads Config.<profile>.toml)
    #[arg(long)]
    pub profile: Option<String>,

    /// Prints CSV to replay (defaults to storage.prints_csv)
    #[arg(long)]
    pub prints: Option<String>,

    /// Only replay prints from this venue
    #[arg(long)]
    pub venue: Option<String>,

    /// Emit on every accepted print once the window is full
    #[arg(long)]
    pub emit_every_print: bool,

    /// Do not write feature rows even if loadings are available
    #[arg(long)]
    pub no_features: bool,
}

/// Snapshots emitted by a replay plus the per-venue counters.
#[derive(Debug, Default)]
pub struct ReplayOutcome {
    /// Ordered by emission time, then venue
    pub snapshots: Vec<CurveSnapshot>,
    pub stats: BTreeMap<String, BuilderStats>,
}

/// Runs the replay command.
///
/// # Errors
/// Returns an error if the config or prints cannot be read, a venue task
/// fails, or an output file cannot be written.
pub async fn run_replay(args: ReplayArgs) -> Result<()> {
    let mut config = load_config(&args.config, args.profile.as_deref())?;
    if args.emit_every_print {
        config.builder.emit_on_roll = false;
    }
    let prints_path = args
        .prints
        .unwrap_or_else(|| config.storage.prints_csv.clone());

    let mut prints = CsvStorage::read_prints(&prints_path)?;
    if let Some(venue) = &args.venue {
        prints.retain(|p| &p.venue == venue);
    }
    info!(
        path = %prints_path,
        prints = prints.len(),
        emit_on_roll = config.builder.emit_on_roll,
        "Starting replay"
    );

    let outcome = replay_prints(prints, &config.builder).await?;

    for (venue, stats) in &outcome.stats {
        info!(
            %venue,
            rolls = stats.rolls,
            refinements = stats.refinements,
            dropped = stats.dropped(),
            emitted = stats.emitted,
            "Venue replay finished"
        );
    }

    if outcome.snapshots.is_empty() {
        warn!("Replay emitted no snapshots");
        return Ok(());
    }

    let rows = CsvStorage::append_snapshots(&config.storage.snapshots_csv, &outcome.snapshots)?;
    info!(
        path = %config.storage.snapshots_csv,
        snapshots = outcome.snapshots.len(),
        rows,
        "Wrote curve snapshots"
    );

    if let Some(path) = &config.storage.snapshots_parquet {
        let rows = ParquetStorage::write_snapshots(path, &outcome.snapshots)?;
        info!(path = %path, rows, "Wrote curve snapshots to Parquet");
    }

    if args.no_features {
        return Ok(());
    }

    let store = LoadingsStore::new(&config.pca.loadings_dir);
    let loadings = match store.resolve(config.pca.version_id.as_deref()) {
        Ok(loadings) => loadings,
        Err(StoreError::Empty { dir }) => {
            info!(%dir, "No PCA loadings fitted yet, skipping features");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to resolve PCA loadings"),
    };

    let extractor = FeatureExtractor::new(config.features.convexity)?;
    let features = extract_all(&extractor, &outcome.snapshots, &loadings);
    CsvStorage::append_features(&config.storage.features_csv, &features)?;
    info!(
        path = %config.storage.features_csv,
        features = features.len(),
        loadings_version = loadings.version_id(),
        "Wrote feature rows"
    );

    Ok(())
}

/// Replays prints through one builder task per venue.
///
/// Prints for a venue are applied in the order given; venues run
/// independently of each other.
///
/// # Errors
/// Returns an error if a venue task stops early or panics.
pub async fn replay_prints(
    prints: Vec<FundingPrint>,
    config: &BuilderConfig,
) -> Result<ReplayOutcome> {
    let (sink_tx, mut sink_rx) = mpsc::channel::<CurveSnapshot>(CHANNEL_SIZE);
    let sink = tokio::spawn(async move {
        let mut snapshots = Vec::new();
        while let Some(snapshot) = sink_rx.recv().await {
            snapshots.push(snapshot);
        }
        snapshots
    });

    let mut feeds: HashMap<String, mpsc::Sender<FundingPrint>> = HashMap::new();
    let mut handles = Vec::new();

    for print in prints {
        let feed = match feeds.entry(print.venue.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (tx, rx) = mpsc::channel::<FundingPrint>(CHANNEL_SIZE);
                let curve = VenueCurve::from_config(entry.key().clone(), config);
                debug!(venue = %entry.key(), "Spawning venue builder");
                handles.push(tokio::spawn(run_venue(curve, rx, sink_tx.clone())));
                entry.insert(tx)
            }
        };
        let venue = print.venue.clone();
        feed.send(print)
            .await
            .map_err(|_| anyhow!("Builder task for {} stopped early", venue))?;
    }

    // closing the feeds ends each venue loop; the sink ends with the last sender
    drop(feeds);
    drop(sink_tx);

    let mut stats = BTreeMap::new();
    for handle in handles {
        let curve = handle.await.context("Venue builder task panicked")?;
        stats.insert(curve.venue().to_string(), curve.stats());
    }

    let mut snapshots = sink.await.context("Snapshot sink task panicked")?;
    snapshots.sort_by(|a, b| {
        a.emitted_at()
            .cmp(&b.emitted_at())
            .then_with(|| a.venue().cmp(b.venue()))
    });

    Ok(ReplayOutcome { snapshots, stats })
}

async fn run_venue(
    mut curve: VenueCurve,
    mut rx: mpsc::Receiver<FundingPrint>,
    sink: mpsc::Sender<CurveSnapshot>,
) -> VenueCurve {
    while let Some(print) = rx.recv().await {
        if let Some(snapshot) = curve.update(&print) {
            if sink.send(snapshot).await.is_err() {
                warn!(venue = curve.venue(), "Snapshot sink closed, stopping builder");
                break;
            }
        }
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn settlement(k: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap() + Duration::hours(8 * k)
    }

    fn print(venue: &str, k: i64, rate: Option<f64>) -> FundingPrint {
        FundingPrint::new(
            venue,
            "BTCUSDT",
            settlement(k) - Duration::minutes(10),
            rate,
            settlement(k),
        )
    }

    fn interleaved(count: i64) -> Vec<FundingPrint> {
        (0..count)
            .flat_map(|k| {
                [
                    print("binance", k, Some(0.0001)),
                    print("bybit", k, Some(0.0002)),
                    print("okx", k, None),
                ]
            })
            .collect()
    }

    #[tokio::test]
    async fn each_venue_rolls_independently() {
        let outcome = replay_prints(interleaved(10), &BuilderConfig::default())
            .await
            .unwrap();

        // binance and bybit each emit at prints 8, 9 and 10; okx never fills
        assert_eq!(outcome.snapshots.len(), 6);
        assert_eq!(outcome.stats["binance"].emitted, 3);
        assert_eq!(outcome.stats["bybit"].emitted, 3);
        assert_eq!(outcome.stats["okx"].invalid, 10);
        assert_eq!(outcome.stats["okx"].emitted, 0);
    }

    #[tokio::test]
    async fn snapshots_are_time_ordered() {
        let outcome = replay_prints(interleaved(12), &BuilderConfig::default())
            .await
            .unwrap();

        let keys: Vec<_> = outcome
            .snapshots
            .iter()
            .map(|s| (s.emitted_at(), s.venue().to_string()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(outcome.snapshots[0].venue(), "binance");
    }

    #[tokio::test]
    async fn refinements_emit_only_when_not_throttled() {
        let mut prints: Vec<_> = (0..8).map(|k| print("binance", k, Some(0.0001))).collect();
        prints.push(print("binance", 7, Some(0.0003)));

        let throttled = replay_prints(prints.clone(), &BuilderConfig::default())
            .await
            .unwrap();
        let every = replay_prints(
            prints,
            &BuilderConfig {
                emit_on_roll: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(throttled.snapshots.len(), 1);
        assert_eq!(every.snapshots.len(), 2);
        assert_eq!(every.snapshots[1].buckets()[7].raw_rate, 0.0003);
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_outcome() {
        let outcome = replay_prints(Vec::new(), &BuilderConfig::default())
            .await
            .unwrap();
        assert!(outcome.snapshots.is_empty());
        assert!(outcome.stats.is_empty());
    }
}
