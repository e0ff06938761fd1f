pub mod config;
pub mod config_loader;
pub mod types;

pub use config::{
    AppConfig, BuilderConfig, ConvexityIndices, FeatureConfig, PcaConfig, StorageConfig,
};
pub use config_loader::ConfigLoader;
pub use types::{
    annualise, BucketRecord, CurveSnapshot, FundingPrint, BUCKET_HOURS, CURVE_BUCKETS,
    PERIODS_PER_YEAR,
};
