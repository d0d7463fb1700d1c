//! モデルとメタデータの永続化
//!
//! モデルディレクトリの構成:
//! - `<model_name>.bin` - モデルの重み（バイナリ）
//! - `synset.txt`       - クラスラベル（1行1ラベル、クラスID順）
//! - `metadata.json`    - メタデータ（エンコード長、クラス数など）

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::DEFAULT_LABELS;
use crate::model::model_metadata::ModelMetadata;

/// ラベルファイル名
pub const LABELS_FILE: &str = "synset.txt";

/// メタデータファイル名
pub const METADATA_FILE: &str = "metadata.json";

/// 重みファイルの拡張子
pub const WEIGHTS_EXTENSION: &str = "bin";

/// モデルディレクトリ内の各ファイルのパス
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub weights: PathBuf,
    pub labels: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new(model_dir: &Path, model_name: &str) -> Self {
        Self {
            weights: model_dir.join(format!("{}.{}", model_name, WEIGHTS_EXTENSION)),
            labels: model_dir.join(LABELS_FILE),
            metadata: model_dir.join(METADATA_FILE),
        }
    }
}

/// メタデータ・ラベルと共にモデルを保存
///
/// 書き込みに失敗した場合はパスと原因を含むエラーを返す（学習は中断される）
pub fn save_model_with_metadata(
    output_dir: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> Result<ArtifactPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create model directory: {}", output_dir.display()))?;

    let paths = ArtifactPaths::new(output_dir, &metadata.model_name);

    fs::write(&paths.weights, model_binary)
        .with_context(|| format!("Failed to write model weights: {}", paths.weights.display()))?;

    save_labels(&paths.labels, &metadata.labels)?;

    let json_str = metadata.to_json_string()?;
    fs::write(&paths.metadata, json_str)
        .with_context(|| format!("Failed to write metadata: {}", paths.metadata.display()))?;

    Ok(paths)
}

/// ラベルを1行1ラベルで書き込む
pub fn save_labels(path: &Path, labels: &[String]) -> Result<()> {
    let mut content = String::new();
    for label in labels {
        content.push_str(label);
        content.push('\n');
    }

    fs::write(path, content).with_context(|| format!("Failed to write label file: {}", path.display()))
}

/// ラベルファイルを読み込む（空行は無視）
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read label file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// モデルディレクトリからラベルを読み込む
///
/// `synset.txt` が存在しない場合はデフォルト順序
/// (POSITIVE, NEUTRAL, NEGATIVE) を使う。存在するのに読めない場合はエラー。
pub fn load_labels_or_default(model_dir: &Path) -> Result<Vec<String>> {
    let path = model_dir.join(LABELS_FILE);
    if !path.exists() {
        tracing::warn!(
            "ラベルファイルが見つかりません: {}。デフォルトのラベル順序を使用します: {}",
            path.display(),
            DEFAULT_LABELS.join(", ")
        );
        return Ok(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect());
    }

    let labels = load_labels(&path)?;
    if labels.is_empty() {
        anyhow::bail!("label file is empty: {}", path.display());
    }
    Ok(labels)
}

/// モデルディレクトリからメタデータを読み込む
pub fn load_metadata(model_dir: &Path) -> Result<ModelMetadata> {
    let path = model_dir.join(METADATA_FILE);
    let json_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    ModelMetadata::from_json_string(&json_str)
}

/// モデルディレクトリから重みのバイナリを読み込む
pub fn load_model_binary(model_dir: &Path, model_name: &str) -> Result<Vec<u8>> {
    let path = ArtifactPaths::new(model_dir, model_name).weights;
    fs::read(&path).with_context(|| format!("Failed to read model weights: {}", path.display()))
}

/// メタデータをログに出力
pub fn print_metadata_info(metadata: &ModelMetadata) {
    tracing::info!("=== モデルメタデータ ===");
    tracing::info!("モデル名: {}", metadata.model_name);
    tracing::info!("ラベル: {}", metadata.labels.join(", "));
    tracing::info!("エンコード長: {}", metadata.input_length);
    tracing::info!(
        "隠れ層: {} -> {}",
        metadata.hidden_sizes[0],
        metadata.hidden_sizes[1]
    );
    tracing::info!(
        "学習: {} エポック, バッチサイズ {}, 学習率 {}",
        metadata.num_epochs,
        metadata.batch_size,
        metadata.learning_rate
    );
    if let Some(accuracy) = metadata.test_accuracy {
        tracing::info!("テスト精度: {:.1}%", accuracy * 100.0);
    }
    tracing::info!("学習日時: {}", metadata.trained_at);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_label_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABELS_FILE);

        save_labels(&path, &labels(&["A", "B", "C"])).unwrap();
        assert_eq!(load_labels(&path).unwrap(), labels(&["A", "B", "C"]));
        assert_eq!(fs::read_to_string(&path).unwrap(), "A\nB\nC\n");
    }

    #[test]
    fn test_missing_labels_fall_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_labels_or_default(dir.path()).unwrap();
        assert_eq!(loaded, labels(&["POSITIVE", "NEUTRAL", "NEGATIVE"]));
    }

    #[test]
    fn test_empty_label_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LABELS_FILE), "\n\n").unwrap();
        assert!(load_labels_or_default(dir.path()).is_err());
    }

    #[test]
    fn test_labels_with_crlf() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LABELS_FILE), "NEGATIVE\r\nPOSITIVE\r\n").unwrap();
        assert_eq!(
            load_labels_or_default(dir.path()).unwrap(),
            labels(&["NEGATIVE", "POSITIVE"])
        );
    }

    #[test]
    fn test_save_model_with_metadata_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("nested").join("model");
        let metadata = ModelMetadata::new("emoji-text-model", labels(&["A", "B", "C"]), 100, [128, 64], 5, 32, 0.01);

        let paths = save_model_with_metadata(&output_dir, &metadata, &[1, 2, 3]).unwrap();

        assert_eq!(paths.weights, output_dir.join("emoji-text-model.bin"));
        assert_eq!(load_model_binary(&output_dir, "emoji-text-model").unwrap(), vec![1, 2, 3]);
        assert_eq!(load_labels(&paths.labels).unwrap(), labels(&["A", "B", "C"]));
        assert_eq!(load_metadata(&output_dir).unwrap(), metadata);
    }

    #[test]
    fn test_save_into_file_path_fails_with_path_in_message() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();
        let metadata = ModelMetadata::new("m", labels(&["A"]), 10, [128, 64], 1, 1, 0.01);

        let err = save_model_with_metadata(&blocker, &metadata, &[0]).unwrap_err();
        assert!(format!("{:#}", err).contains("not_a_dir"));
    }

    #[test]
    fn test_missing_weights_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_model_binary(dir.path(), "emoji-text-model").is_err());
        assert!(load_metadata(dir.path()).is_err());
    }
}
