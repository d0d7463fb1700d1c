//! テキスト → 絵文字 変換サービス
//!
//! プロセス起動時に一度だけ構築し、全リクエストで共有する。
//! 初期化に失敗してもプロセスは落とさず、以降は利用不可の絵文字を返し続ける。
//! 推論エラーはリクエスト単位で捕捉し、エラー用の絵文字に変換する。

use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use crate::model::ModelSettings;
use crate::types::{EmojiSentiment, Prediction};

/// 感情ラベルに対応しない場合の絵文字
pub const UNKNOWN_EMOJI: &str = "🤔";

/// 推論中にエラーが起きた場合の絵文字
pub const ERROR_EMOJI: &str = "❌";

/// モデルが読み込めていない場合の絵文字
pub const UNAVAILABLE_EMOJI: &str = "🚫";

/// テキストから確率分布を求める推論器
pub trait Predictor: Send + Sync {
    fn predict(&self, text: &str) -> Result<Prediction>;
}

/// ラベルを絵文字に変換
pub fn emoji_for_label(label: &str) -> &'static str {
    match label {
        "POSITIVE" => "😊",
        "NEGATIVE" => "😢",
        "NEUTRAL" => "😐",
        _ => UNKNOWN_EMOJI,
    }
}

enum ServiceState {
    Ready(Arc<dyn Predictor>),
    Unavailable { reason: String },
}

/// 絵文字サービス
pub struct EmojiService {
    state: ServiceState,
}

impl EmojiService {
    /// モデルディレクトリから初期化する（失敗しても利用不可状態で返す）
    pub fn load(model_dir: &Path, settings: &ModelSettings) -> Self {
        match Self::load_predictor(model_dir, settings) {
            Ok(predictor) => Self::with_predictor(predictor),
            Err(e) => {
                tracing::error!("モデルの読み込みに失敗しました ({}): {:#}", model_dir.display(), e);
                Self::unavailable(format!("{:#}", e))
            }
        }
    }

    #[cfg(feature = "ml")]
    fn load_predictor(model_dir: &Path, settings: &ModelSettings) -> Result<Arc<dyn Predictor>> {
        let engine = crate::ml::InferenceEngine::load(model_dir, settings)?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "ml"))]
    fn load_predictor(_model_dir: &Path, _settings: &ModelSettings) -> Result<Arc<dyn Predictor>> {
        anyhow::bail!("機械学習機能が有効化されていません")
    }

    pub fn with_predictor(predictor: Arc<dyn Predictor>) -> Self {
        Self {
            state: ServiceState::Ready(predictor),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ServiceState::Unavailable { reason: reason.into() },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ServiceState::Ready(_))
    }

    /// 利用不可の理由
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            ServiceState::Ready(_) => None,
            ServiceState::Unavailable { reason } => Some(reason),
        }
    }

    /// 推論を実行し、エラーとpanicをまとめて捕捉する
    fn run_prediction(predictor: &dyn Predictor, text: &str) -> Result<Prediction> {
        match panic::catch_unwind(AssertUnwindSafe(|| predictor.predict(text))) {
            Ok(result) => result,
            Err(_) => anyhow::bail!("inference panicked"),
        }
    }

    /// テキストを絵文字1文字に変換する
    pub fn classify(&self, text: &str) -> &'static str {
        let predictor = match &self.state {
            ServiceState::Ready(predictor) => predictor,
            ServiceState::Unavailable { .. } => return UNAVAILABLE_EMOJI,
        };

        match Self::run_prediction(predictor.as_ref(), text) {
            Ok(prediction) => match prediction.best_label() {
                Some(label) => emoji_for_label(label),
                None => {
                    tracing::error!("推論結果が空です");
                    ERROR_EMOJI
                }
            },
            Err(e) => {
                tracing::error!("推論エラー: {:#}", e);
                ERROR_EMOJI
            }
        }
    }

    /// 絵文字と感情ごとの確率を返す（利用不可・推論エラー時はNone）
    pub fn analyze(&self, text: &str) -> Option<EmojiSentiment> {
        let ServiceState::Ready(predictor) = &self.state else {
            return None;
        };

        match Self::run_prediction(predictor.as_ref(), text) {
            Ok(prediction) => {
                let emoji = prediction.best_label().map(emoji_for_label).unwrap_or(ERROR_EMOJI);
                Some(EmojiSentiment::from_prediction(emoji, &prediction))
            }
            Err(e) => {
                tracing::error!("推論エラー: {:#}", e);
                None
            }
        }
    }
}
