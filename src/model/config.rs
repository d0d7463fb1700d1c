//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、モデル、学習、サーバーの設定をJSON形式で保存・読み込みします。

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// テキストエンコード長（学習・推論で共通）
pub const INPUT_LENGTH: usize = 100;

/// モデル識別子（拡張子なし）
pub const MODEL_NAME: &str = "emoji-text-model";

/// 隠れ層のユニット数（メタデータが無い場合もこの値でモデルを組み立てる）
pub const HIDDEN_SIZES: [usize; 2] = [128, 64];

/// ラベルファイルが無い場合に使うデフォルトのクラス順序
pub const DEFAULT_LABELS: [&str; 3] = ["POSITIVE", "NEUTRAL", "NEGATIVE"];

/// 計算デバイスの種類
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Cpu
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" | "ndarray" => Ok(DeviceType::Cpu),
            "wgpu" | "gpu" => Ok(DeviceType::Wgpu),
            other => Err(format!("unknown device type: {} (expected cpu or wgpu)", other)),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 推論時に読み込むモデルディレクトリ
    pub model_dir: String,
    /// 重みファイル名（拡張子なし）
    pub model_name: String,
    /// エンコード長
    pub input_length: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_dir: "models/emoji-text".to_string(),
            model_name: MODEL_NAME.to_string(),
            input_length: INPUT_LENGTH,
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// 学習用CSV
    pub train_path: String,
    /// 評価用CSV（未指定なら学習データを分割する）
    #[serde(default)]
    pub test_path: Option<String>,
    /// モデル出力先ディレクトリ
    pub output_dir: String,
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// 学習率（固定）
    pub learning_rate: f64,
    /// ランダムシード
    pub seed: u64,
    /// テストファイルが無い場合のトレーニングデータの割合
    pub train_ratio: f32,
    /// CSVの区切り文字
    pub delimiter: char,
    /// クラス順序（この順番がクラスIDになる）
    pub labels: Vec<String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            train_path: "data/train.csv".to_string(),
            test_path: Some("data/test.csv".to_string()),
            output_dir: "models/emoji-text".to_string(),
            num_epochs: 5,
            batch_size: 32,
            learning_rate: 0.01,
            seed: 42,
            train_ratio: 0.8,
            delimiter: ',',
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類（学習時のみ使用）
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// トレーニング設定
    #[serde(default)]
    pub training: TrainingSettings,
    /// サーバー設定
    #[serde(default)]
    pub server: ServerSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// 指定パスから設定を読み込む、存在しない・壊れている場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("設定ファイルが存在しません。デフォルト設定を使用します: {}", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                tracing::info!("設定ファイルを読み込みました: {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("設定ファイルの読み込みに失敗しました ({:#})。デフォルト設定を使用します", e);
                Self::default()
            }
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// 設定値の妥当性を検証
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.input_length == 0 {
            anyhow::bail!("model.input_length must be greater than zero");
        }
        if self.model.model_name.trim().is_empty() {
            anyhow::bail!("model.model_name cannot be empty");
        }

        let training = &self.training;
        if training.batch_size == 0 {
            anyhow::bail!("training.batch_size must be greater than zero");
        }
        if training.num_epochs == 0 {
            anyhow::bail!("training.num_epochs must be greater than zero");
        }
        if !(training.learning_rate > 0.0) {
            anyhow::bail!("training.learning_rate must be positive");
        }
        if !(training.train_ratio > 0.0 && training.train_ratio < 1.0) {
            anyhow::bail!("training.train_ratio must be in (0, 1), got {}", training.train_ratio);
        }
        if !training.delimiter.is_ascii() || training.delimiter == '"' {
            anyhow::bail!("training.delimiter must be an ASCII character other than '\"'");
        }
        if training.labels.is_empty() {
            anyhow::bail!("training.labels cannot be empty");
        }

        let mut seen = HashSet::new();
        for label in &training.labels {
            if label.trim().is_empty() {
                anyhow::bail!("training.labels cannot contain empty labels");
            }
            // ラベルファイルは読み込み時に前後の空白を除去する
            if label != label.trim() {
                anyhow::bail!("training.labels cannot have leading or trailing whitespace: {:?}", label);
            }
            if !seen.insert(label.as_str()) {
                anyhow::bail!("duplicate label in training.labels: {}", label);
            }
        }

        Ok(())
    }
}
