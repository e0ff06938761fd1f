use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn settlement(k: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(8 * k)
}

fn write_prints(path: &Path) {
    let mut csv = String::from("venue,symbol,observed_at,predicted_rate,settlement_at\n");
    for k in 0..30 {
        for (venue, phase) in [("binance", 0.0), ("bybit", 1.7)] {
            let x = k as f64 + phase;
            let rate = 0.0001 + 0.00006 * (x * 0.45).sin() + 0.00002 * (x * 1.3).cos();
            csv.push_str(&format!(
                "{venue},BTCUSDT,{},{rate},{}\n",
                (settlement(k) - Duration::minutes(5)).to_rfc3339(),
                settlement(k).to_rfc3339()
            ));
        }
        // a gap that must be skipped without disturbing the curve
        csv.push_str(&format!(
            "okx,BTC-USDT-SWAP,{},,{}\n",
            settlement(k).to_rfc3339(),
            settlement(k).to_rfc3339()
        ));
    }
    fs::write(path, csv).unwrap();
}

fn write_config(dir: &Path) -> String {
    let config = dir.join("Config.toml");
    let p = |name: &str| dir.join(name).display().to_string();
    fs::write(
        &config,
        format!(
            "[pca]\nloadings_dir = {:?}\n\n[storage]\nprints_csv = {:?}\nsnapshots_csv = {:?}\nfeatures_csv = {:?}\nsnapshots_parquet = {:?}\n",
            p("loadings"),
            p("prints.csv"),
            p("snapshots.csv"),
            p("features.csv"),
            p("snapshots.parquet"),
        ),
    )
    .unwrap();
    config.display().to_string()
}

fn funding_curve(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_funding-curve"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn replay_fit_and_build_features() {
    let dir = tempdir().unwrap();
    write_prints(&dir.path().join("prints.csv"));
    let config = write_config(dir.path());

    let replay = funding_curve(&["replay", "--config", &config]);
    assert!(replay.status.success(), "{replay:?}");

    // 30 prints per venue: 23 snapshots each, 8 rows per snapshot plus header
    let snapshots = fs::read_to_string(dir.path().join("snapshots.csv")).unwrap();
    assert_eq!(snapshots.lines().count(), 2 * 23 * 8 + 1);
    assert!(!snapshots.contains("okx"));
    assert!(dir.path().join("snapshots.parquet").exists());
    // no loadings yet, so no features
    assert!(!dir.path().join("features.csv").exists());

    let fit = funding_curve(&["fit-pca", "--config", &config]);
    assert!(fit.status.success(), "{fit:?}");
    let version = String::from_utf8(fit.stdout).unwrap().trim().to_string();
    assert!(dir
        .path()
        .join("loadings")
        .join(format!("{version}.json"))
        .exists());

    let build = funding_curve(&["build-features", "--config", &config, "--replace"]);
    assert!(build.status.success(), "{build:?}");

    let features = fs::read_to_string(dir.path().join("features.csv")).unwrap();
    assert_eq!(features.lines().count(), 2 * 23 + 1);
    assert!(features.lines().skip(1).all(|line| line.contains(&version)));
}

#[test]
fn pinned_but_missing_loadings_fail_build_features() {
    let dir = tempdir().unwrap();
    write_prints(&dir.path().join("prints.csv"));
    let config = write_config(dir.path());
    assert!(funding_curve(&["replay", "--config", &config]).status.success());

    let build = funding_curve(&[
        "build-features",
        "--config",
        &config,
        "--loadings-version",
        "does-not-exist",
    ]);

    assert!(!build.status.success());
}

#[test]
fn fit_fails_without_enough_history() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    fs::write(
        dir.path().join("snapshots.csv"),
        "venue,symbol,emitted_at,horizon_start_h,horizon_end_h,raw_rate,annualised_rate,settlement_at,observed_at\n",
    )
    .unwrap();

    let fit = funding_curve(&["fit-pca", "--config", &config]);

    assert!(!fit.status.success());
    assert!(!dir.path().join("loadings").exists());
}
