use serde::{Deserialize, Serialize};

/// 1件のテキストに対する推論結果（ラベルごとの確率、クラスID順）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub labels: Vec<String>,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn new(labels: Vec<String>, probabilities: Vec<f32>) -> Self {
        Self { labels, probabilities }
    }

    /// 最も確率の高いラベル（同率の場合は先頭）
    pub fn best_label(&self) -> Option<&str> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &p) in self.probabilities.iter().enumerate() {
            match best {
                Some((_, best_p)) if p <= best_p => {}
                _ if p.is_nan() => {}
                _ => best = Some((i, p)),
            }
        }
        best.and_then(|(i, _)| self.labels.get(i)).map(String::as_str)
    }

    /// ラベルの確率（存在しなければ0.0）
    pub fn probability(&self, label: &str) -> f32 {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.probabilities.get(i).copied())
            .unwrap_or(0.0)
    }
}

/// 絵文字と感情ごとの確率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiSentiment {
    pub emoji: String,
    pub positive_probability: f64,
    pub neutral_probability: f64,
    pub negative_probability: f64,
}

impl EmojiSentiment {
    pub fn from_prediction(emoji: impl Into<String>, prediction: &Prediction) -> Self {
        Self {
            emoji: emoji.into(),
            positive_probability: prediction.probability("POSITIVE") as f64,
            neutral_probability: prediction.probability("NEUTRAL") as f64,
            negative_probability: prediction.probability("NEGATIVE") as f64,
        }
    }

    /// 支配的な感情
    ///
    /// POSITIVE/NEGATIVEは他の2つより厳密に大きい場合のみ、それ以外はNEUTRAL
    pub fn dominant_sentiment(&self) -> &'static str {
        let (pos, neu, neg) = (
            self.positive_probability,
            self.neutral_probability,
            self.negative_probability,
        );
        if pos > neu && pos > neg {
            "POSITIVE"
        } else if neg > neu && neg > pos {
            "NEGATIVE"
        } else {
            "NEUTRAL"
        }
    }
}
