//! 機械学習モデルの共通定義
//!
//! テキスト感情分類用の全結合ネットワークを提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig, Relu},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 入力次元（エンコード長）
    pub input_size: usize,
    /// 分類クラス数
    pub num_classes: usize,
    /// 隠れ層1のユニット数
    #[config(default = "crate::model::HIDDEN_SIZES[0]")]
    pub hidden_size_1: usize,
    /// 隠れ層2のユニット数
    #[config(default = "crate::model::HIDDEN_SIZES[1]")]
    pub hidden_size_2: usize,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> SentimentClassifier<B> {
        tracing::debug!(
            "[Model] {} -> {} -> {} -> {}",
            self.input_size,
            self.hidden_size_1,
            self.hidden_size_2,
            self.num_classes
        );

        SentimentClassifier {
            fc1: LinearConfig::new(self.input_size, self.hidden_size_1).init(device),
            fc2: LinearConfig::new(self.hidden_size_1, self.hidden_size_2).init(device),
            fc3: LinearConfig::new(self.hidden_size_2, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// テキスト感情分類用の全結合モデル
///
/// # アーキテクチャ
/// - FC: input_size -> 128 + ReLU
/// - FC: 128 -> 64 + ReLU
/// - FC: 64 -> num_classes
/// - Softmax (分類時)
#[derive(Module, Debug)]
pub struct SentimentClassifier<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> SentimentClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `features`: エンコード済みテキスト [batch_size, input_size]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(features);
        let x = self.activation.forward(x);

        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);

        self.fc3.forward(x)
    }

    /// クラスごとの確率を返す [batch_size, num_classes]
    pub fn predict_proba(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.forward(features), 1)
    }

    /// 順伝播と損失計算（学習用）
    pub fn forward_classification(
        &self,
        features: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(features);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
