//! 絵文字サーバー
//!
//! 学習済みモデルを読み込み、`GET /api/emoji?text=...` で絵文字を返す。

use clap::Parser;
use emoji_sentiment_lib::model::AppConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "emoji_sentiment", about = "Serve text-to-emoji sentiment predictions over HTTP")]
struct Cli {
    /// 設定ファイル（JSON）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 学習済みモデルのディレクトリ
    #[arg(long)]
    model_dir: Option<String>,

    /// 待ち受けホスト
    #[arg(long)]
    host: Option<String>,

    /// 待ち受けポート
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("emoji_sentiment=info".parse()?)
                .add_directive("emoji_sentiment_lib=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path);
    if let Some(model_dir) = cli.model_dir {
        config.model.model_dir = model_dir;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    emoji_sentiment_lib::run(config).await
}
