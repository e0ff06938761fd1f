use thiserror::Error;

/// Errors surfaced by fitting or projecting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PcaError {
    /// Not enough independent history to define two components
    #[error("Insufficient data: {0}")]
    InsufficientData(#[from] InsufficientData),

    /// Vector of the wrong length or containing non-finite values
    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },
}

impl PcaError {
    pub(crate) fn invalid_vector(reason: impl Into<String>) -> Self {
        Self::InvalidVector {
            reason: reason.into(),
        }
    }
}

/// Which part of the fit lacked data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsufficientData {
    #[error("need at least 2 samples, got {samples}")]
    TooFewSamples { samples: usize },

    #[error("covariance is rank-deficient for component {component} (eigenvalue {eigenvalue:e})")]
    RankDeficient { component: usize, eigenvalue: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid convexity indices: {0}")]
pub struct InvalidConvexityIndices(pub String);
