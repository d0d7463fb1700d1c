//! モデル学習
//!
//! CSVからデータセットを構築し、全結合モデルを固定学習率のAdamで学習して
//! 重み・ラベル・メタデータをモデルディレクトリに保存します。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::{Wgpu, WgpuDevice};

use crate::csv_loader::{load_labeled_csv, TextSample};
use crate::ml::ModelConfig;
use crate::model::{
    print_metadata_info, save_model_with_metadata, ArtifactPaths, DeviceType, ModelMetadata, ModelSettings,
    TrainingSettings,
};

/// データセット読み込み設定
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// CSVファイルのパス
    pub path: PathBuf,
    /// バッチサイズ
    pub batch_size: usize,
    /// シャッフルする場合のシード
    pub shuffle: Option<u64>,
    /// 区切り文字
    pub delimiter: u8,
}

/// 学習データセット（エンコード済みサンプルを保持）
pub struct TextDataset {
    samples: Vec<TextSample>,
    class_names: Vec<String>,
}

impl TextDataset {
    /// CSVからデータセットを読み込む
    pub fn load(config: &DatasetConfig, class_names: &[String], input_length: usize) -> Result<Self> {
        let rows = load_labeled_csv(&config.path, class_names, input_length, config.delimiter)?;

        tracing::info!(
            "{} から {} 件読み込みました (未知ラベル: {} 行, 不正な行: {} 行)",
            config.path.display(),
            rows.len(),
            rows.unknown_label_rows,
            rows.malformed_rows
        );

        let dataset = Self::from_samples(rows.samples, class_names.to_vec());
        for (name, count) in dataset.class_names.iter().zip(dataset.class_counts()) {
            tracing::info!("  クラス '{}': {} 件", name, count);
        }

        Ok(dataset)
    }

    pub fn from_samples(samples: Vec<TextSample>, class_names: Vec<String>) -> Self {
        Self { samples, class_names }
    }

    /// クラスIDごとの件数
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_names.len()];
        for sample in &self.samples {
            if let Some(count) = counts.get_mut(sample.label) {
                *count += 1;
            }
        }
        counts
    }

    /// データセットを学習用と検証用に分割
    pub fn split(self, train_ratio: f32, seed: u64) -> (Self, Self) {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut samples = self.samples;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let train_len = (samples.len() as f32 * train_ratio) as usize;
        let val_samples = samples.split_off(train_len);

        (
            Self::from_samples(samples, self.class_names.clone()),
            Self::from_samples(val_samples, self.class_names),
        )
    }
}

impl Dataset<TextSample> for TextDataset {
    fn get(&self, index: usize) -> Option<TextSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// バッチャー
#[derive(Clone)]
pub struct TextBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TextBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct TextBatch<B: Backend> {
    pub features: Tensor<B, 2>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, TextSample, TextBatch<B>> for TextBatcher<B> {
    fn batch(&self, items: Vec<TextSample>, _device: &B::Device) -> TextBatch<B> {
        let batch_size = items.len();
        let input_length = items.first().map(|item| item.features.len()).unwrap_or(0);

        let mut all_features = Vec::with_capacity(batch_size * input_length);
        let mut targets_vec = Vec::with_capacity(batch_size);
        for item in items {
            all_features.extend_from_slice(&item.features);
            targets_vec.push(item.label as i64);
        }

        let features = Tensor::<B, 1>::from_floats(all_features.as_slice(), &self.device)
            .reshape([batch_size, input_length]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), &self.device);

        TextBatch { features, targets }
    }
}

/// エポックごとの指標
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    /// テストデータが空の場合はNaN
    pub test_loss: f64,
    pub test_accuracy: f64,
}

/// 学習結果
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    pub num_train: usize,
    pub num_test: usize,
    pub artifact: ArtifactPaths,
}

impl TrainingReport {
    pub fn last_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

/// 正解数を数える
fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    // argmax(1) は [batch, 1] を返すので [batch] に潰して比較する
    let predictions = output.argmax(1).flatten::<1>(0, 1);
    predictions.equal(targets).int().sum().into_scalar().elem::<i64>() as usize
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator / denominator as f64
    } else {
        f64::NAN
    }
}

/// モデル学習を実行
///
/// 書き込みに失敗した場合は致命的エラーとして中断する。
/// 不正なCSV行は警告を出してスキップする。
pub fn train_model(
    settings: &TrainingSettings,
    model_settings: &ModelSettings,
    device_type: &DeviceType,
) -> Result<TrainingReport> {
    tracing::info!("学習を開始します");
    tracing::info!("学習データ: {}", settings.train_path);
    tracing::info!("テストデータ: {}", settings.test_path.as_deref().unwrap_or("(学習データから分割)"));
    tracing::info!("出力先: {}", settings.output_dir);

    let output_dir = Path::new(&settings.output_dir);
    if !output_dir.exists() {
        tracing::info!("出力ディレクトリを作成します: {}", output_dir.display());
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    }

    let labels = &settings.labels;
    let input_length = model_settings.input_length;
    let delimiter = u8::try_from(settings.delimiter)
        .with_context(|| format!("Delimiter must be a single-byte character: {:?}", settings.delimiter))?;

    let train_config = DatasetConfig {
        path: PathBuf::from(&settings.train_path),
        batch_size: settings.batch_size,
        shuffle: Some(settings.seed),
        delimiter,
    };

    tracing::info!("学習データを読み込みます...");
    let train_dataset = TextDataset::load(&train_config, labels, input_length)?;

    let (train_dataset, test_dataset) = match &settings.test_path {
        Some(test_path) => {
            tracing::info!("テストデータを読み込みます...");
            let test_config = DatasetConfig {
                path: PathBuf::from(test_path),
                batch_size: settings.batch_size,
                shuffle: None,
                delimiter,
            };
            (train_dataset, TextDataset::load(&test_config, labels, input_length)?)
        }
        None => train_dataset.split(settings.train_ratio, settings.seed),
    };

    // 分割後に学習データが残らない場合も含めて中断する
    if train_dataset.len() == 0 {
        anyhow::bail!("No training samples available from {}", settings.train_path);
    }
    let class_counts = train_dataset.class_counts();

    if test_dataset.len() == 0 {
        tracing::warn!("テストデータが空です。評価はスキップされます");
    }

    let num_train = train_dataset.len();
    let num_test = test_dataset.len();
    tracing::info!("学習データ: {} 件", num_train);
    tracing::info!("テストデータ: {} 件", num_test);

    let model_config = ModelConfig::new(input_length, labels.len());
    tracing::info!(
        "モデル設定: {} クラス, 入力長: {}, 隠れ層: {} -> {}",
        model_config.num_classes,
        model_config.input_size,
        model_config.hidden_size_1,
        model_config.hidden_size_2
    );
    tracing::info!("使用デバイス: {}", device_type);

    let (model_binary, epochs) = match device_type {
        DeviceType::Cpu => fit::<Autodiff<NdArray>>(
            NdArrayDevice::Cpu,
            &model_config,
            &train_config,
            train_dataset,
            test_dataset,
            settings,
        )?,
        DeviceType::Wgpu => fit::<Autodiff<Wgpu>>(
            WgpuDevice::default(),
            &model_config,
            &train_config,
            train_dataset,
            test_dataset,
            settings,
        )?,
    };

    let mut metadata = ModelMetadata::new(
        model_settings.model_name.clone(),
        labels.clone(),
        input_length,
        [model_config.hidden_size_1, model_config.hidden_size_2],
        settings.num_epochs,
        settings.batch_size,
        settings.learning_rate,
    );
    metadata.class_counts = class_counts;
    if let Some(last) = epochs.last().filter(|m| !m.test_loss.is_nan()) {
        metadata.test_accuracy = Some(last.test_accuracy);
        metadata.test_loss = Some(last.test_loss);
    }

    tracing::info!("モデルを保存します: {}", output_dir.display());
    let artifact = save_model_with_metadata(output_dir, &metadata, &model_binary)?;
    tracing::info!("重み: {}", artifact.weights.display());
    tracing::info!("ラベル: {}", artifact.labels.display());
    print_metadata_info(&metadata);

    Ok(TrainingReport {
        epochs,
        num_train,
        num_test,
        artifact,
    })
}

/// 指定バックエンドで学習し、重みのバイナリとエポックごとの指標を返す
fn fit<B: AutodiffBackend>(
    device: B::Device,
    model_config: &ModelConfig,
    train_config: &DatasetConfig,
    train_dataset: TextDataset,
    test_dataset: TextDataset,
    settings: &TrainingSettings,
) -> Result<(Vec<u8>, Vec<EpochMetrics>)> {
    let mut model = model_config.init::<B>(&device);
    tracing::info!("パラメータ数: {}", model.num_params());

    let mut optim = AdamConfig::new().init();

    let mut train_builder = DataLoaderBuilder::new(TextBatcher::<B>::new(device.clone()))
        .batch_size(train_config.batch_size)
        .num_workers(0);
    if let Some(seed) = train_config.shuffle {
        train_builder = train_builder.shuffle(seed);
    }
    let train_loader = train_builder.build(train_dataset);

    // 検証は内部バックエンドで行う（autodiff不要）
    let test_loader = DataLoaderBuilder::new(TextBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(train_config.batch_size)
        .num_workers(0)
        .build(test_dataset);

    let mut history = Vec::with_capacity(settings.num_epochs);

    for epoch in 1..=settings.num_epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches = 0usize;
        let mut train_correct = 0usize;
        let mut train_total = 0usize;

        for batch in train_loader.iter() {
            train_total += batch.targets.dims()[0];
            let item = model.forward_classification(batch.features, batch.targets);

            train_loss_sum += item.loss.clone().into_scalar().elem::<f64>();
            train_batches += 1;
            train_correct += count_correct(item.output, item.targets);

            let grads = item.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(settings.learning_rate, model, grads);
        }

        let model_valid = model.valid();
        let mut test_loss_sum = 0.0f64;
        let mut test_batches = 0usize;
        let mut test_correct = 0usize;
        let mut test_total = 0usize;

        for batch in test_loader.iter() {
            test_total += batch.targets.dims()[0];
            let item = model_valid.forward_classification(batch.features, batch.targets);

            test_loss_sum += item.loss.into_scalar().elem::<f64>();
            test_batches += 1;
            test_correct += count_correct(item.output, item.targets);
        }

        let metrics = EpochMetrics {
            epoch,
            train_loss: ratio(train_loss_sum, train_batches),
            train_accuracy: ratio(train_correct as f64, train_total),
            test_loss: ratio(test_loss_sum, test_batches),
            test_accuracy: ratio(test_correct as f64, test_total),
        };

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | test_loss={:.4} | test_acc={:.1}%",
            epoch,
            settings.num_epochs,
            metrics.train_loss,
            metrics.train_accuracy * 100.0,
            metrics.test_loss,
            metrics.test_accuracy * 100.0
        );
        history.push(metrics);
    }

    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let model_binary = recorder
        .record(model.valid().into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みのシリアライズエラー: {:?}", e))?;

    Ok((model_binary, history))
}
