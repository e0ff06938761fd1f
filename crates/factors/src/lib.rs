//! Curve factors: closed-form shape statistics plus principal-component
//! scores against versioned, offline-fitted loadings.

pub mod error;
pub mod features;
pub mod pca;

pub use error::{InsufficientData, InvalidConvexityIndices, PcaError};
pub use features::{extract_features, DecayRatio, FeatureExtractor, FeatureVector};
pub use pca::{FitOptions, PcaLoadings, PcaProjector};
