use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::TuneHubResolver;
use crate::cache::SongInfoCache;
use crate::config::Config;
use crate::lyrics::active_line_index;
use crate::player::{AudioQuality, NullOutput, Platform, PlayerService};
use crate::storage::{JsonFileStorage, PlayerStore};
use crate::utils::{format_time, LrcParser};

pub struct App {
    config: Arc<Config>,
}

impl App {
    /// 创建新应用实例
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Ok(Self { config })
    }

    /// 按配置组装解析器与缓存
    pub fn build_cache(&self) -> Result<SongInfoCache> {
        let resolver =
            Arc::new(TuneHubResolver::new(&self.config.api).context("无法创建 HTTP 客户端")?);
        Ok(SongInfoCache::new(
            resolver,
            self.config.player.cache_capacity,
            &self.config.player.stream_proxy,
        ))
    }

    /// 按配置组装播放服务并恢复上次的状态
    pub fn build_service(&self) -> Result<PlayerService> {
        let state_path = self.config.storage.state_path();
        debug!("状态文件: {:?}", state_path);
        let store = PlayerStore::new(Box::new(JsonFileStorage::open(state_path)));
        let mut service = PlayerService::new(self.build_cache()?, store, Box::new(NullOutput));
        service.restore();
        Ok(service)
    }

    /// 解析一首歌并输出结果
    pub async fn resolve(&self, id: &str, platform: Platform, quality: AudioQuality) -> Result<()> {
        info!("解析歌曲 {}:{}:{}", platform, quality, id);
        let cache = self.build_cache()?;
        let song = cache
            .resolve(id, platform, quality)
            .await
            .with_context(|| format!("解析歌曲 {} 失败", id))?;

        let lines = LrcParser::parse(&song.lyric_text);
        println!("{} - {}", song.name, song.artist);
        if !song.album.is_empty() {
            println!("专辑: {}", song.album);
        }
        println!("音源: {}", song.stream_url);
        if !song.cover_url.is_empty() {
            println!("封面: {}", song.cover_url);
        }
        println!("歌词: {}行", lines.len());
        Ok(())
    }

    /// 输出 LRC 文件的解析结果，`at` 指定时标记当前行
    pub fn lyrics(&self, path: &Path, at: Option<f64>) -> Result<()> {
        let content =
            fs::read_to_string(path).with_context(|| format!("无法读取歌词文件 {:?}", path))?;
        let lines = LrcParser::parse(&content);
        if lines.is_empty() {
            println!("没有可用的歌词");
            return Ok(());
        }

        let active = at.and_then(|t| active_line_index(&lines, t));
        for (i, line) in lines.iter().enumerate() {
            let marker = if Some(i) == active { ">" } else { " " };
            println!("{} [{}] {}", marker, format_time(line.time), line.text);
        }
        Ok(())
    }

    /// 输出保存的播放队列
    pub fn queue(&self) -> Result<()> {
        let service = self.build_service()?;
        let snapshot = service.snapshot();

        println!(
            "模式: {:?}  音质: {}  音量: {:.0}%",
            snapshot.play_mode,
            snapshot.quality,
            snapshot.volume * 100.0
        );
        if snapshot.queue.is_empty() {
            println!("播放队列为空");
        }
        for (i, track) in snapshot.queue.iter().enumerate() {
            let marker = if i == snapshot.current_index { ">" } else { " " };
            println!(
                "{} {:>3}. {} - {} [{}]",
                marker,
                i + 1,
                track.name,
                track.artist,
                track.platform
            );
        }
        if let Some(track) = service.last_track() {
            println!("上次播放: {} - {}", track.name, track.artist);
        }
        Ok(())
    }
}
