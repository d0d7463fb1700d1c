//! 学習用バイナリ
//!
//! CSVからモデルを学習し、重み・ラベル・メタデータを出力ディレクトリに保存する。

use clap::Parser;
use emoji_sentiment_lib::ml::train_model;
use emoji_sentiment_lib::model::{AppConfig, DeviceType};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the text-to-emoji sentiment classifier")]
struct Cli {
    /// 設定ファイル（JSON）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 学習用CSV
    #[arg(long)]
    train: Option<String>,

    /// 評価用CSV
    #[arg(long, conflicts_with = "no_test")]
    test: Option<String>,

    /// 評価用CSVを使わず、学習データを分割して評価する
    #[arg(long)]
    no_test: bool,

    /// モデル出力先ディレクトリ
    #[arg(long)]
    output: Option<String>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// 計算デバイス（cpu / wgpu）
    #[arg(long)]
    device: Option<DeviceType>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        let training = &mut config.training;
        if let Some(train) = self.train {
            training.train_path = train;
        }
        if let Some(test) = self.test {
            training.test_path = Some(test);
        }
        if self.no_test {
            training.test_path = None;
        }
        if let Some(output) = self.output {
            training.output_dir = output;
        }
        if let Some(epochs) = self.epochs {
            training.num_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            training.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            training.learning_rate = learning_rate;
        }
        if let Some(device) = self.device {
            config.device_type = device;
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path);
    cli.apply(&mut config);
    config.validate()?;

    let report = train_model(&config.training, &config.model, &config.device_type)?;

    if let Some(last) = report.last_epoch() {
        tracing::info!(
            "学習完了: train_loss={:.4}, train_acc={:.2}%",
            last.train_loss,
            last.train_accuracy * 100.0
        );
        if report.num_test > 0 {
            tracing::info!(
                "評価: loss={:.4}, accuracy={:.2}% ({}件)",
                last.test_loss,
                last.test_accuracy * 100.0,
                report.num_test
            );
        }
    }
    tracing::info!("モデル: {}", report.artifact.weights.display());
    tracing::info!("ラベル: {}", report.artifact.labels.display());
    tracing::info!("メタデータ: {}", report.artifact.metadata.display());
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("train=info,emoji_sentiment_lib=info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("学習に失敗しました: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
