//! モデルメタデータの定義
//!
//! 重みファイルと同じディレクトリに `metadata.json` として保存され、
//! 推論時にエンコード長とクラス数の整合性チェックに使われます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// 重みファイル名（拡張子なし）
    pub model_name: String,

    /// クラスラベル（この順序がクラスIDになる）
    /// 例: ["POSITIVE", "NEUTRAL", "NEGATIVE"]
    pub labels: Vec<String>,

    /// エンコード長（モデル入力次元）
    pub input_length: usize,

    /// 隠れ層のユニット数
    pub hidden_sizes: [usize; 2],

    /// 学習エポック数
    pub num_epochs: usize,

    /// バッチサイズ
    pub batch_size: usize,

    /// 学習率
    pub learning_rate: f64,

    /// 学習データのクラスごとの件数（labelsと同じ順序）
    #[serde(default)]
    pub class_counts: Vec<usize>,

    /// 最終エポックのテスト精度
    #[serde(default)]
    pub test_accuracy: Option<f64>,

    /// 最終エポックのテスト損失
    #[serde(default)]
    pub test_loss: Option<f64>,

    /// モデルの学習時刻（RFC3339形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成（学習時刻は現在時刻）
    pub fn new(
        model_name: impl Into<String>,
        labels: Vec<String>,
        input_length: usize,
        hidden_sizes: [usize; 2],
        num_epochs: usize,
        batch_size: usize,
        learning_rate: f64,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            labels,
            input_length,
            hidden_sizes,
            num_epochs,
            batch_size,
            learning_rate,
            class_counts: Vec::new(),
            test_accuracy: None,
            test_loss: None,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
