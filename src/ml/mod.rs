//! Training pipeline and inference service for the severity classifier.

pub mod boosting;
pub mod encoder;
pub mod service;
pub mod training;

pub use boosting::{BoostingParams, GradientBoostedTrees};
pub use encoder::LabelEncoder;
pub use service::{ModelInfo, ModelService};
pub use training::{train, ClassMetrics, TrainedArtifact, TrainingReport};
