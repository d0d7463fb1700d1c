//! モデル推論機能

use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Mutex;

use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::Tensor,
};
use burn_ndarray::{NdArray, NdArrayDevice};

use crate::ml::{encode_text, ModelConfig, SentimentClassifier};
use crate::model::{load_model_binary, InferenceConfig, ModelSettings};
use crate::service::Predictor;
use crate::types::Prediction;

/// 推論エンジン（CPU / NdArray）
///
/// モデルは読み込み後は変更しない。burnのモジュールは `Sync` ではないため
/// `Mutex` に入れ、ロック中はハンドルの複製のみ行う（テンソルは参照カウント）。
/// 順伝播はロックの外で実行する。
pub struct InferenceEngine {
    model: Mutex<SentimentClassifier<NdArray>>,
    config: InferenceConfig,
    device: NdArrayDevice,
}

impl InferenceEngine {
    /// モデルディレクトリを読み込んで推論エンジンを初期化
    pub fn load(model_dir: &Path, settings: &ModelSettings) -> Result<Self> {
        let config = InferenceConfig::load_from_model_dir(model_dir, settings)?;
        let device = NdArrayDevice::Cpu;

        let model_config = ModelConfig::new(config.input_length, config.num_total_classes())
            .with_hidden_size_1(config.hidden_sizes[0])
            .with_hidden_size_2(config.hidden_sizes[1]);
        let model = model_config.init::<NdArray>(&device);

        let model_binary = load_model_binary(model_dir, &config.model_name)?;

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        let engine = Self {
            model: Mutex::new(model),
            config,
            device,
        };
        engine.verify()?;

        tracing::info!(
            "モデルを読み込みました: {} (ラベル: {}, エンコード長: {})",
            model_dir.display(),
            engine.config.labels.join(", "),
            engine.config.input_length
        );
        Ok(engine)
    }

    /// 空入力で一度推論し、重みの形状がメタデータと合っているか確認する
    fn verify(&self) -> Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.predict_text("")));
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.context("model self-check failed")),
            Err(_) => anyhow::bail!(
                "model weights do not match the expected shape (input length {}, {} classes)",
                self.config.input_length,
                self.config.num_total_classes()
            ),
        }
    }

    /// テキストを分類してラベルごとの確率を返す
    pub fn predict_text(&self, text: &str) -> Result<Prediction> {
        let input_length = self.config.input_length;
        let encoded = encode_text(text, input_length);

        let model = self
            .model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let input = Tensor::<NdArray, 1>::from_floats(encoded.as_slice(), &self.device)
            .reshape([1, input_length]);
        let probabilities = model
            .predict_proba(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))?;

        if probabilities.len() != self.config.num_total_classes() {
            anyhow::bail!(
                "model produced {} scores for {} labels",
                probabilities.len(),
                self.config.num_total_classes()
            );
        }

        Ok(Prediction::new(self.config.labels.clone(), probabilities))
    }
}

impl Predictor for InferenceEngine {
    fn predict(&self, text: &str) -> Result<Prediction> {
        self.predict_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{save_model_with_metadata, ModelMetadata};
    use std::fs;

    fn labels() -> Vec<String> {
        vec!["POSITIVE".to_string(), "NEUTRAL".to_string(), "NEGATIVE".to_string()]
    }

    /// 未学習のモデルを保存する
    fn write_untrained_model(dir: &Path, input_length: usize, num_classes: usize, metadata_labels: Vec<String>) {
        let device = NdArrayDevice::Cpu;
        let model = ModelConfig::new(input_length, num_classes).init::<NdArray>(&device);
        let binary = BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(model.into_record(), ())
            .unwrap();
        let metadata = ModelMetadata::new("emoji-text-model", metadata_labels, input_length, [128, 64], 1, 1, 0.01);
        save_model_with_metadata(dir, &metadata, &binary).unwrap();
    }

    #[test]
    fn test_load_and_predict() {
        let dir = tempfile::tempdir().unwrap();
        write_untrained_model(dir.path(), 100, 3, labels());

        let engine = InferenceEngine::load(dir.path(), &ModelSettings::default()).unwrap();
        let prediction = engine.predict_text("hello").unwrap();

        assert_eq!(prediction.labels, labels());
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(prediction.best_label().is_some());
        // 同じ入力には同じ結果
        assert_eq!(prediction, engine.predict_text("hello").unwrap());
    }

    #[test]
    fn test_missing_weights_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InferenceEngine::load(dir.path(), &ModelSettings::default()).is_err());
    }

    #[test]
    fn test_corrupt_weights_fail() {
        let dir = tempfile::tempdir().unwrap();
        write_untrained_model(dir.path(), 100, 3, labels());
        fs::write(dir.path().join("emoji-text-model.bin"), b"not a model").unwrap();

        assert!(InferenceEngine::load(dir.path(), &ModelSettings::default()).is_err());
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        // 重みは入力長20で作るが、メタデータは入力長100を主張する
        write_untrained_model(dir.path(), 20, 3, labels());
        let metadata = ModelMetadata::new("emoji-text-model", labels(), 100, [128, 64], 1, 1, 0.01);
        fs::write(dir.path().join("metadata.json"), metadata.to_json_string().unwrap()).unwrap();

        assert!(InferenceEngine::load(dir.path(), &ModelSettings::default()).is_err());
    }
}
