use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::api::{MetadataResolver, ResolveBatch, ResolvedEntry};
use crate::config::ApiConfig;
use crate::error::{PlayerError, Result};
use crate::player::{AudioQuality, Platform};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize, Debug)]
struct ParseRequest<'a> {
    platform: &'a str,
    ids: String,
    quality: &'a str,
}

#[derive(Deserialize, Debug)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<ParseData>,
}

#[derive(Deserialize, Debug, Default)]
struct ParseData {
    #[serde(default)]
    data: Vec<ParsedSong>,
    #[serde(default)]
    total: usize,
    #[serde(default)]
    success_count: usize,
    #[serde(default)]
    fail_count: usize,
}

#[derive(Deserialize, Debug)]
struct ParsedSong {
    #[serde(default)]
    id: String,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    url: String,
    info: Option<ParsedSongInfo>,
    cover: Option<String>,
    lyrics: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ParsedSongInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: String,
    album: Option<String>,
}

impl From<ParsedSong> for ResolvedEntry {
    fn from(song: ParsedSong) -> Self {
        let (name, artist, album) = match song.info {
            Some(info) => (Some(info.name), Some(info.artist), info.album),
            None => (None, None, None),
        };
        ResolvedEntry {
            id: song.id,
            success: song.success,
            stream_url: song.url,
            cover_url: song.cover,
            lyric_text: song.lyrics,
            name,
            artist,
            album,
        }
    }
}

/// TuneHub 解析接口
pub struct TuneHubResolver {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    retry_on_empty: bool,
}

impl TuneHubResolver {
    /// 创建新的 TuneHub 解析器，HTTP 客户端无法创建时返回错误
    pub fn new(config: &ApiConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/parse", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            retry_on_empty: config.retry_on_empty,
        })
    }

    async fn request(
        &self,
        platform: Platform,
        quality: AudioQuality,
        ids: &[String],
    ) -> Result<ResolveBatch> {
        let body = ParseRequest {
            platform: platform.as_str(),
            ids: ids.join(","),
            quality: quality.as_str(),
        };

        debug!("请求解析: {} {:?} ({})", platform, ids, quality);

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-Key", key);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            error!("解析请求失败: HTTP {}", status);
            return Err(PlayerError::ResolutionFailed(format!("HTTP {}", status)));
        }

        let envelope: Envelope = resp
            .json()
            .await
            .map_err(|e| PlayerError::ResolutionFailed(format!("响应格式错误: {}", e)))?;
        into_batch(envelope)
    }
}

fn into_batch(envelope: Envelope) -> Result<ResolveBatch> {
    if envelope.code != 0 {
        let message = envelope.message.unwrap_or_else(|| "Parse failed".to_string());
        return Err(PlayerError::ResolutionFailed(message));
    }
    let data = envelope
        .data
        .ok_or_else(|| PlayerError::ResolutionFailed("响应缺少 data 字段".to_string()))?;

    Ok(ResolveBatch {
        results: data.data.into_iter().map(ResolvedEntry::from).collect(),
        total: data.total,
        success_count: data.success_count,
        fail_count: data.fail_count,
    })
}

#[async_trait]
impl MetadataResolver for TuneHubResolver {
    fn name(&self) -> &str {
        "tunehub"
    }

    async fn resolve_batch(
        &self,
        platform: Platform,
        quality: AudioQuality,
        ids: &[String],
    ) -> Result<ResolveBatch> {
        let batch = self.request(platform, quality, ids).await?;
        // 空结果重试一次，网络错误不重试
        if batch.results.is_empty() && self.retry_on_empty {
            info!("解析结果为空，重试一次: {} {:?}", platform, ids);
            return self.request(platform, quality, ids).await;
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> Envelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_batch_maps_entries() {
        let batch = into_batch(envelope(
            r#"{
                "code": 0,
                "message": "ok",
                "data": {
                    "data": [{
                        "id": "1",
                        "success": true,
                        "url": "https://cdn.example.com/1.mp3",
                        "info": {"name": "Song", "artist": "Singer", "album": "Record", "duration": 200},
                        "cover": "https://cdn.example.com/1.jpg",
                        "lyrics": "[00:01.00]hi",
                        "fromCache": true
                    }],
                    "total": 1,
                    "success_count": 1,
                    "fail_count": 0
                }
            }"#,
        ))
        .unwrap();

        assert_eq!(batch.total, 1);
        assert_eq!(batch.success_count, 1);
        let entry = &batch.results[0];
        assert!(entry.success);
        assert_eq!(entry.stream_url, "https://cdn.example.com/1.mp3");
        assert_eq!(entry.name.as_deref(), Some("Song"));
        assert_eq!(entry.album.as_deref(), Some("Record"));
        assert_eq!(entry.lyric_text.as_deref(), Some("[00:01.00]hi"));
    }

    #[test]
    fn test_into_batch_rejects_error_code() {
        let err = into_batch(envelope(r#"{"code": -1, "message": "API Key not configured"}"#))
            .unwrap_err();
        assert_eq!(
            err,
            PlayerError::ResolutionFailed("API Key not configured".to_string())
        );

        let err = into_batch(envelope(r#"{"code": 0}"#)).unwrap_err();
        assert!(matches!(err, PlayerError::ResolutionFailed(_)));
    }

    #[test]
    fn test_endpoint_and_key_from_config() {
        let config = ApiConfig {
            base_url: "https://api.example.com/api/".to_string(),
            api_key: Some(String::new()),
            timeout_secs: 5,
            retry_on_empty: true,
        };
        let resolver = TuneHubResolver::new(&config).unwrap();
        assert_eq!(resolver.endpoint, "https://api.example.com/api/v1/parse");
        assert!(resolver.api_key.is_none());
    }
}
