//! 播放器核心类型

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// 音乐平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Netease,
    Qq,
    Kugou,
    Kuwo,
    Migu,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Netease => "netease",
            Platform::Qq => "qq",
            Platform::Kugou => "kugou",
            Platform::Kuwo => "kuwo",
            Platform::Migu => "migu",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "netease" => Ok(Platform::Netease),
            "qq" | "qqmusic" => Ok(Platform::Qq),
            "kugou" => Ok(Platform::Kugou),
            "kuwo" => Ok(Platform::Kuwo),
            "migu" => Ok(Platform::Migu),
            other => Err(format!("未知的平台: {}", other)),
        }
    }
}

/// 音质
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioQuality {
    #[serde(rename = "128k")]
    Standard,
    #[default]
    #[serde(rename = "320k")]
    High,
    #[serde(rename = "flac")]
    Lossless,
    #[serde(rename = "flac24bit")]
    HiRes,
}

impl AudioQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Standard => "128k",
            AudioQuality::High => "320k",
            AudioQuality::Lossless => "flac",
            AudioQuality::HiRes => "flac24bit",
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "128k" => Ok(AudioQuality::Standard),
            "320k" => Ok(AudioQuality::High),
            "flac" => Ok(AudioQuality::Lossless),
            "flac24bit" => Ok(AudioQuality::HiRes),
            other => Err(format!("未知的音质: {}", other)),
        }
    }
}

/// 播放模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayMode {
    /// 顺序播放，到队尾停止
    #[default]
    Sequential,
    /// 列表循环
    Loop,
    /// 单曲循环（只影响自动切歌）
    LoopOne,
    /// 随机播放
    Shuffle,
}

impl PlayMode {
    /// 按 顺序 → 列表循环 → 单曲循环 → 随机 轮换
    pub fn cycle(self) -> Self {
        match self {
            PlayMode::Sequential => PlayMode::Loop,
            PlayMode::Loop => PlayMode::LoopOne,
            PlayMode::LoopOne => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Sequential,
        }
    }
}

/// 曲目
///
/// 身份由 `(id, platform)` 决定，其余字段只是展示信息，
/// 解析完成后可能补全 `cover` 与 `album`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// 时长（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artist: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            album: None,
            platform,
            cover: None,
            duration: None,
        }
    }

    /// 是否为同一首歌（id 与平台都相同）
    pub fn same_entity(&self, other: &Track) -> bool {
        self.id == other.id && self.platform == other.platform
    }
}

/// 解析后的可播放信息
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedSongInfo {
    pub name: String,
    pub artist: String,
    pub album: String,
    pub stream_url: String,
    pub cover_url: String,
    pub lyric_text: String,
}

/// 切歌原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    UserNext,
    UserPrev,
    TrackEnded,
    TrackFailed,
}

/// 播放进度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackPosition {
    pub current_time: f64,
    /// 0 表示时长未知
    pub duration: f64,
    pub is_playing: bool,
    pub is_loading: bool,
}

/// 队列状态
#[derive(Debug, Clone, PartialEq)]
pub enum QueueState {
    Empty,
    Idle(Track),
    Playing(Track),
}

/// 播放器只读快照
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub current_track: Option<Track>,
    pub queue: Vec<Track>,
    pub current_index: usize,
    pub play_mode: PlayMode,
    pub quality: AudioQuality,
    pub position: PlaybackPosition,
    pub volume: f64,
    pub last_error: Option<PlayerError>,
}
