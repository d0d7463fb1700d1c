pub mod encoder;
#[cfg(feature = "ml")]
pub mod ml_model;
#[cfg(feature = "ml")]
pub mod training;
#[cfg(feature = "ml")]
pub mod inference;

pub use encoder::encode_text;
#[cfg(feature = "ml")]
pub use ml_model::{ModelConfig, SentimentClassifier};
#[cfg(feature = "ml")]
pub use training::{train_model, DatasetConfig, EpochMetrics, TextBatch, TextBatcher, TextDataset, TrainingReport};
#[cfg(feature = "ml")]
pub use inference::InferenceEngine;
