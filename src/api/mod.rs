//! 歌曲解析接口
//!
//! [`MetadataResolver`] 把 (平台, 音质, id 列表) 解析成可播放信息，
//! 缓存层只依赖这个 trait；[`TuneHubResolver`] 是基于 HTTP 的实现。

mod tunehub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::player::{AudioQuality, Platform};

pub use tunehub::TuneHubResolver;

/// 单个 id 的解析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub id: String,
    pub success: bool,
    pub stream_url: String,
    pub cover_url: Option<String>,
    pub lyric_text: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// 批量解析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveBatch {
    pub results: Vec<ResolvedEntry>,
    pub total: usize,
    pub success_count: usize,
    pub fail_count: usize,
}

/// 歌曲解析器接口
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// 获取解析器名称
    fn name(&self) -> &str;

    /// 批量解析，网络错误、非成功状态、空响应都会返回错误
    async fn resolve_batch(
        &self,
        platform: Platform,
        quality: AudioQuality,
        ids: &[String],
    ) -> Result<ResolveBatch>;
}
