//! On-disk store for fitted PCA loadings.
//!
//! Each version lives in its own `{version_id}.json` file, so a refit never
//! overwrites loadings that earlier feature rows were projected against.

use funding_curve_factors::{PcaError, PcaLoadings};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by [`LoadingsStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error reading/writing a loadings file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File parsed but the loadings are unusable.
    #[error("Invalid loadings: {0}")]
    Invalid(#[from] PcaError),

    #[error("No loadings found for version {version_id:?}")]
    NotFound { version_id: String },

    #[error("Loadings directory {dir} holds no fitted versions")]
    Empty { dir: String },
}

/// Directory of versioned loadings files.
#[derive(Debug, Clone)]
pub struct LoadingsStore {
    dir: PathBuf,
}

impl LoadingsStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes loadings under their version id and returns the file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, loadings: &PcaLoadings) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(loadings.version_id());
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, loadings)?;

        info!(
            path = %path.display(),
            version_id = loadings.version_id(),
            n_samples = loadings.n_samples(),
            "Saved PCA loadings"
        );
        Ok(path)
    }

    /// Loads and validates one version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no file exists for the version, or
    /// a parse/validation error if the file is corrupt.
    pub fn load(&self, version_id: &str) -> Result<PcaLoadings, StoreError> {
        if !is_plain_id(version_id) {
            return Err(StoreError::NotFound {
                version_id: version_id.to_string(),
            });
        }
        let path = self.path_for(version_id);
        if !path.exists() {
            return Err(StoreError::NotFound {
                version_id: version_id.to_string(),
            });
        }
        read_file(&path)
    }

    /// All readable versions, oldest fit first.
    ///
    /// Unreadable files are logged and skipped. A missing directory is an
    /// empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn list(&self) -> Result<Vec<PcaLoadings>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_file(&path) {
                Ok(loadings) => versions.push(loadings),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable loadings file"
                ),
            }
        }

        versions.sort_by(|a, b| {
            a.fitted_at()
                .cmp(&b.fitted_at())
                .then_with(|| a.version_id().cmp(b.version_id()))
        });
        Ok(versions)
    }

    /// Most recently fitted version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Empty`] if the store holds no readable version.
    pub fn latest(&self) -> Result<PcaLoadings, StoreError> {
        self.list()?.pop().ok_or_else(|| StoreError::Empty {
            dir: self.dir.display().to_string(),
        })
    }

    /// Loads the pinned version if one is given, otherwise the latest.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load) and [`latest`](Self::latest).
    pub fn resolve(&self, version_id: Option<&str>) -> Result<PcaLoadings, StoreError> {
        match version_id {
            Some(id) => self.load(id),
            None => self.latest(),
        }
    }

    fn path_for(&self, version_id: &str) -> PathBuf {
        self.dir.join(format!("{version_id}.json"))
    }
}

fn read_file(path: &Path) -> Result<PcaLoadings, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let loadings: PcaLoadings = serde_json::from_reader(reader)?;
    loadings.validate()?;
    debug!(path = %path.display(), version_id = loadings.version_id(), "Loaded PCA loadings");
    Ok(loadings)
}

fn is_plain_id(version_id: &str) -> bool {
    !version_id.is_empty()
        && version_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
