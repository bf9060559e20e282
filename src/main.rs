use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunehub_player::app::App;
use tunehub_player::config::Config;
use tunehub_player::player::{AudioQuality, Platform};

#[derive(Parser)]
#[command(name = "tunehub-player")]
#[command(about = "多平台音乐播放核心", long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 解析歌曲的音源、封面与歌词
    Resolve {
        /// 歌曲 id
        id: String,
        /// 平台
        #[arg(short, long, default_value = "netease")]
        platform: Platform,
        /// 音质
        #[arg(short, long, default_value = "320k")]
        quality: AudioQuality,
    },
    /// 解析本地 LRC 文件
    Lyrics {
        /// 歌词文件
        file: PathBuf,
        /// 标记该时间（秒）对应的歌词行
        #[arg(long)]
        at: Option<f64>,
    },
    /// 查看保存的播放队列
    Queue,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunehub_player=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(cli.config)?);
    debug!("配置: {:?}", config);
    let app = App::new(config)?;

    match cli.command {
        Commands::Resolve {
            id,
            platform,
            quality,
        } => app.resolve(&id, platform, quality).await?,
        Commands::Lyrics { file, at } => app.lyrics(&file, at)?,
        Commands::Queue => app.queue()?,
    }

    Ok(())
}
