//! 推論設定
//!
//! モデルディレクトリからラベル順序とエンコード長を取得し、
//! クラスインデックスとラベルの対応を提供します。

use anyhow::Result;
use std::path::Path;

use crate::model::config::{ModelSettings, HIDDEN_SIZES};
use crate::model::model_metadata::ModelMetadata;
use crate::model::model_storage::{self, METADATA_FILE};

/// 推論に必要なモデル情報
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// クラスラベル（インデックス順）
    pub labels: Vec<String>,

    /// エンコード長
    pub input_length: usize,

    /// 重みファイル名（拡張子なし）
    pub model_name: String,

    /// 隠れ層のユニット数
    pub hidden_sizes: [usize; 2],
}

impl InferenceConfig {
    /// メタデータからInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Self {
        Self {
            labels: metadata.labels.clone(),
            input_length: metadata.input_length,
            model_name: metadata.model_name.clone(),
            hidden_sizes: metadata.hidden_sizes,
        }
    }

    /// モデルディレクトリから推論設定を読み込む
    ///
    /// - ラベルは `synset.txt`（無ければデフォルト順序）
    /// - エンコード長は `metadata.json`（無ければ設定値）
    /// - 両方ある場合はラベルが一致しなければエラー
    pub fn load_from_model_dir(model_dir: &Path, settings: &ModelSettings) -> Result<Self> {
        let labels = model_storage::load_labels_or_default(model_dir)?;

        if !model_dir.join(METADATA_FILE).exists() {
            tracing::warn!(
                "{} が見つかりません。設定値を使用します (エンコード長: {}, モデル名: {})",
                METADATA_FILE,
                settings.input_length,
                settings.model_name
            );
            return Ok(Self {
                labels,
                input_length: settings.input_length,
                model_name: settings.model_name.clone(),
                hidden_sizes: HIDDEN_SIZES,
            });
        }

        let metadata = model_storage::load_metadata(model_dir)?;
        if metadata.labels != labels {
            anyhow::bail!(
                "label order mismatch: {} has [{}] but metadata has [{}]",
                model_dir.display(),
                labels.join(", "),
                metadata.labels.join(", ")
            );
        }

        Ok(Self::from_metadata(&metadata))
    }

    /// クラス数
    pub fn num_total_classes(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::model_storage::{save_labels, LABELS_FILE};
    use std::fs;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_without_metadata_uses_settings() {
        let dir = tempfile::tempdir().unwrap();
        save_labels(&dir.path().join(LABELS_FILE), &labels(&["A", "B"])).unwrap();

        let settings = ModelSettings {
            input_length: 42,
            ..Default::default()
        };
        let config = InferenceConfig::load_from_model_dir(dir.path(), &settings).unwrap();
        assert_eq!(config.labels, labels(&["A", "B"]));
        assert_eq!(config.input_length, 42);
        assert_eq!(config.model_name, "emoji-text-model");
        assert_eq!(config.hidden_sizes, HIDDEN_SIZES);
    }

    #[test]
    fn test_load_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = ModelMetadata::new("custom", labels(&["X", "Y", "Z"]), 64, [128, 64], 5, 2, 0.01);
        model_storage::save_model_with_metadata(dir.path(), &metadata, &[0]).unwrap();

        let config = InferenceConfig::load_from_model_dir(dir.path(), &ModelSettings::default()).unwrap();
        assert_eq!(config, InferenceConfig::from_metadata(&metadata));
        assert_eq!(config.input_length, 64);
    }

    #[test]
    fn test_label_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = ModelMetadata::new("m", labels(&["X", "Y"]), 64, [128, 64], 5, 2, 0.01);
        model_storage::save_model_with_metadata(dir.path(), &metadata, &[0]).unwrap();
        fs::write(dir.path().join(LABELS_FILE), "Y\nX\n").unwrap();

        assert!(InferenceConfig::load_from_model_dir(dir.path(), &ModelSettings::default()).is_err());
    }
}
