//! Principal-component loadings for eight-bucket curves.
//!
//! Fitting and projecting are separate operations. [`PcaProjector::fit`] runs
//! offline over a historical matrix (rows = snapshots, columns = the
//! eight annualised buckets) and issues an immutable, versioned
//! [`PcaLoadings`]. [`PcaProjector::project`] scores a single curve against
//! loadings that already exist and never refits.

use crate::error::{InsufficientData, PcaError};
use chrono::{DateTime, Utc};
use funding_curve_core::CURVE_BUCKETS;
use nalgebra::{SMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const N: usize = CURVE_BUCKETS;

type Matrix = [[f64; N]; N];

/// Minimum history rows for a covariance estimate.
pub const MIN_SAMPLES: usize = 2;

/// Leading eigenvalue at or below this fraction of the history's raw second
/// moment (mean squared entry) is treated as zero variance.
const ZERO_VARIANCE_TOL: f64 = 1e-20;

/// Second eigenvalue must exceed this fraction of the first.
const REL_EIGEN_TOL: f64 = 1e-10;

/// Preprocessing applied to the history matrix before the decomposition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FitOptions {
    /// Clip each column to mean +/- z population standard deviations
    pub winsorise_z: Option<f64>,
}

impl FitOptions {
    #[must_use]
    pub fn with_winsorise_z(mut self, z: f64) -> Self {
        self.winsorise_z = Some(z);
        self
    }
}

/// Versioned pair of loading vectors.
///
/// Immutable once fitted. A refit produces a new value with a new
/// `version_id`; holders of an older version keep using it until they swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaLoadings {
    version_id: String,
    mean_vector: [f64; N],
    component1: [f64; N],
    component2: [f64; N],
    explained_variance: [f64; 2],
    n_samples: usize,
    fitted_at: DateTime<Utc>,
}

impl PcaLoadings {
    #[must_use]
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    #[must_use]
    pub fn mean_vector(&self) -> &[f64; N] {
        &self.mean_vector
    }

    #[must_use]
    pub fn component1(&self) -> &[f64; N] {
        &self.component1
    }

    #[must_use]
    pub fn component2(&self) -> &[f64; N] {
        &self.component2
    }

    /// Eigenvalues of the two components, largest first.
    #[must_use]
    pub fn explained_variance(&self) -> [f64; 2] {
        self.explained_variance
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    #[must_use]
    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    /// Checks loadings that came from outside this process (e.g. disk).
    ///
    /// # Errors
    ///
    /// Returns [`PcaError::InvalidVector`] if any vector has non-finite
    /// entries or a component is not unit norm.
    pub fn validate(&self) -> Result<(), PcaError> {
        check_finite(&self.mean_vector, "mean_vector")?;
        let components = [("component1", &self.component1), ("component2", &self.component2)];
        for (name, component) in components {
            check_finite(component, name)?;
            let norm = dot(component, component).sqrt();
            if (norm - 1.0).abs() > 1e-6 {
                return Err(PcaError::invalid_vector(format!(
                    "{name} has norm {norm}, expected 1"
                )));
            }
        }
        Ok(())
    }
}

/// Fits loadings from history and projects curves onto them.
pub struct PcaProjector;

impl PcaProjector {
    /// Fits two components from an `N x 8` history matrix.
    ///
    /// # Errors
    ///
    /// - [`PcaError::InsufficientData`] with fewer than two rows, or when the
    ///   covariance cannot support two components (reports which one).
    /// - [`PcaError::InvalidVector`] if a row holds non-finite values.
    pub fn fit(history: &[[f64; N]]) -> Result<PcaLoadings, PcaError> {
        Self::fit_with_options(history, &FitOptions::default())
    }

    /// Fits with optional winsorisation of the history columns.
    ///
    /// # Errors
    ///
    /// Same as [`fit`](Self::fit).
    pub fn fit_with_options(
        history: &[[f64; N]],
        options: &FitOptions,
    ) -> Result<PcaLoadings, PcaError> {
        if history.len() < MIN_SAMPLES {
            return Err(InsufficientData::TooFewSamples {
                samples: history.len(),
            }
            .into());
        }
        for (i, row) in history.iter().enumerate() {
            check_finite(row, &format!("history row {i}"))?;
        }

        let mut rows = history.to_vec();
        if let Some(z) = options.winsorise_z {
            winsorise_columns(&mut rows, z);
        }

        let mean_vector = column_means(&rows);
        let covariance = covariance(&rows, &mean_vector);
        let (eigenvalues, eigenvectors) = symmetric_eigen(&covariance);

        let mut order: [usize; N] = std::array::from_fn(|i| i);
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let (lambda1, lambda2) = (eigenvalues[order[0]], eigenvalues[order[1]]);
        if lambda1 <= 0.0 || lambda1 <= ZERO_VARIANCE_TOL * second_moment(&rows) {
            return Err(InsufficientData::RankDeficient {
                component: 1,
                eigenvalue: lambda1,
            }
            .into());
        }
        if lambda2 <= REL_EIGEN_TOL * lambda1 {
            return Err(InsufficientData::RankDeficient {
                component: 2,
                eigenvalue: lambda2,
            }
            .into());
        }

        let component1 = normalise_sign(unit(column(&eigenvectors, order[0])));
        let component2 = normalise_sign(unit(column(&eigenvectors, order[1])));

        let loadings = PcaLoadings {
            version_id: Uuid::new_v4().to_string(),
            mean_vector,
            component1,
            component2,
            explained_variance: [lambda1, lambda2],
            n_samples: rows.len(),
            fitted_at: Utc::now(),
        };

        info!(
            version_id = %loadings.version_id,
            n_samples = loadings.n_samples,
            lambda1,
            lambda2,
            "Fitted PCA loadings"
        );
        Ok(loadings)
    }

    /// Scores one curve: `pc_i = (vector - mean) . component_i`.
    ///
    /// Pure and lock-free; safe to call from many threads against the same
    /// loadings.
    ///
    /// # Errors
    ///
    /// Returns [`PcaError::InvalidVector`] unless `vector` has exactly eight
    /// finite values.
    pub fn project(vector: &[f64], loadings: &PcaLoadings) -> Result<(f64, f64), PcaError> {
        let vector: &[f64; N] = vector.try_into().map_err(|_| {
            PcaError::invalid_vector(format!("expected {N} values, got {}", vector.len()))
        })?;
        check_finite(vector, "curve")?;

        let centered: [f64; N] = std::array::from_fn(|k| vector[k] - loadings.mean_vector[k]);
        Ok((
            dot(&centered, &loadings.component1),
            dot(&centered, &loadings.component2),
        ))
    }
}

fn check_finite(values: &[f64; N], what: &str) -> Result<(), PcaError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(k) => Err(PcaError::invalid_vector(format!(
            "{what} has non-finite value at bucket {k}"
        ))),
        None => Ok(()),
    }
}

fn dot(a: &[f64; N], b: &[f64; N]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn column_means(rows: &[[f64; N]]) -> [f64; N] {
    let n = rows.len() as f64;
    std::array::from_fn(|k| rows.iter().map(|r| r[k]).sum::<f64>() / n)
}

/// Sample covariance (`n - 1` divisor) of the centered rows.
fn covariance(rows: &[[f64; N]], mean: &[f64; N]) -> Matrix {
    let denom = (rows.len() - 1) as f64;
    let mut cov = [[0.0; N]; N];
    for row in rows {
        let centered: [f64; N] = std::array::from_fn(|k| row[k] - mean[k]);
        for i in 0..N {
            for j in i..N {
                cov[i][j] += centered[i] * centered[j];
            }
        }
    }
    for i in 0..N {
        for j in i..N {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Clips every column to `mean +/- z * std` (population std). Columns with
/// zero spread are left alone.
fn winsorise_columns(rows: &mut [[f64; N]], z: f64) {
    let n = rows.len() as f64;
    for k in 0..N {
        let mean = rows.iter().map(|r| r[k]).sum::<f64>() / n;
        let std = (rows.iter().map(|r| (r[k] - mean).powi(2)).sum::<f64>() / n).sqrt();
        if std < f64::EPSILON {
            continue;
        }
        let (lo, hi) = (mean - z * std, mean + z * std);
        for row in rows.iter_mut() {
            row[k] = row[k].clamp(lo, hi);
        }
    }
}

/// Mean squared entry of the history, the scale rank checks are measured on.
fn second_moment(rows: &[[f64; N]]) -> f64 {
    let total: f64 = rows.iter().map(|r| dot(r, r)).sum();
    total / (rows.len() * N) as f64
}

/// Eigen-decomposition of the symmetric covariance matrix.
///
/// Returns the eigenvalues (unsorted) and a matrix whose columns are the
/// matching orthonormal eigenvectors.
fn symmetric_eigen(cov: &Matrix) -> ([f64; N], Matrix) {
    let eigen = SymmetricEigen::new(SMatrix::<f64, N, N>::from_fn(|i, j| cov[i][j]));
    (
        std::array::from_fn(|i| eigen.eigenvalues[i]),
        std::array::from_fn(|i| std::array::from_fn(|j| eigen.eigenvectors[(i, j)])),
    )
}

fn column(m: &Matrix, j: usize) -> [f64; N] {
    std::array::from_fn(|i| m[i][j])
}

fn unit(mut v: [f64; N]) -> [f64; N] {
    let norm = dot(&v, &v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Flips `v` so its largest-magnitude entry (first on ties) is positive.
fn normalise_sign(mut v: [f64; N]) -> [f64; N] {
    let mut pivot = 0;
    for k in 1..N {
        if v[k].abs() > v[pivot].abs() {
            pivot = k;
        }
    }
    if v[pivot] < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
    v
}
