pub mod model_metadata;
pub mod model_storage;
pub mod inference_config;
pub mod config;

pub use model_metadata::ModelMetadata;
pub use model_storage::{
    save_model_with_metadata, load_labels, load_labels_or_default, load_metadata, load_model_binary,
    print_metadata_info, ArtifactPaths,
};
pub use inference_config::InferenceConfig;
pub use config::{AppConfig, DeviceType, ModelSettings, ServerSettings, TrainingSettings, DEFAULT_LABELS, HIDDEN_SIZES, INPUT_LENGTH, MODEL_NAME};
