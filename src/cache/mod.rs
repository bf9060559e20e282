//! 歌曲信息缓存
//!
//! 按 (平台, 音质, id) 缓存解析结果。同一个键的并发请求共享同一次
//! 解析（`Shared` future），失败不缓存并原样交给所有等待者。
//! 容量有限，超出时淘汰最早插入的条目。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

use crate::api::MetadataResolver;
use crate::error::{PlayerError, Result};
use crate::player::{AudioQuality, Platform, ResolvedSongInfo};
use crate::utils::to_proxy_url;

/// 默认缓存容量
pub const DEFAULT_CAPACITY: usize = 200;

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub platform: Platform,
    pub quality: AudioQuality,
    pub id: String,
}

impl CacheKey {
    pub fn new(id: impl Into<String>, platform: Platform, quality: AudioQuality) -> Self {
        Self {
            platform,
            quality,
            id: id.into(),
        }
    }
}

type PendingResolve = Shared<BoxFuture<'static, Result<ResolvedSongInfo>>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, ResolvedSongInfo>,
    /// 插入顺序，用于淘汰
    order: VecDeque<CacheKey>,
    in_flight: HashMap<CacheKey, PendingResolve>,
}

impl CacheState {
    fn insert(&mut self, key: CacheKey, info: ResolvedSongInfo, capacity: usize) {
        if self.entries.insert(key.clone(), info).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            debug!("缓存已满，淘汰: {:?}", oldest);
            self.entries.remove(&oldest);
        }
    }
}

/// 歌曲信息缓存
#[derive(Clone)]
pub struct SongInfoCache {
    resolver: Arc<dyn MetadataResolver>,
    state: Arc<Mutex<CacheState>>,
    capacity: usize,
    stream_proxy: Arc<str>,
}

impl SongInfoCache {
    /// 创建新的缓存，容量至少为 1
    pub fn new(resolver: Arc<dyn MetadataResolver>, capacity: usize, stream_proxy: &str) -> Self {
        Self {
            resolver,
            state: Arc::new(Mutex::new(CacheState::default())),
            capacity: capacity.max(1),
            stream_proxy: Arc::from(stream_proxy),
        }
    }

    /// 解析歌曲信息
    ///
    /// 命中缓存时不会调用解析器；同一个键已有解析在进行时等待同一个结果。
    pub async fn resolve(
        &self,
        id: &str,
        platform: Platform,
        quality: AudioQuality,
    ) -> Result<ResolvedSongInfo> {
        let key = CacheKey::new(id, platform, quality);

        let pending = {
            let mut state = self.lock();
            if let Some(hit) = state.entries.get(&key) {
                debug!("缓存命中: {}:{}:{}", platform, quality, id);
                return Ok(hit.clone());
            }
            match state.in_flight.get(&key) {
                Some(pending) => {
                    debug!("复用进行中的解析: {}:{}:{}", platform, quality, id);
                    pending.clone()
                }
                None => {
                    let pending = self.start_resolution(key.clone());
                    state.in_flight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_resolution(&self, key: CacheKey) -> PendingResolve {
        let resolver = Arc::clone(&self.resolver);
        let state = Arc::clone(&self.state);
        let capacity = self.capacity;
        let proxy = Arc::clone(&self.stream_proxy);

        async move {
            let result = fetch(resolver.as_ref(), &key, &proxy).await;
            finish(&state, key, &result, capacity);
            result
        }
        .boxed()
        .shared()
    }

    /// 只查缓存，不触发解析
    pub fn peek(&self, key: &CacheKey) -> Option<ResolvedSongInfo> {
        self.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 进行中的解析数量
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn finish(
    state: &Mutex<CacheState>,
    key: CacheKey,
    result: &Result<ResolvedSongInfo>,
    capacity: usize,
) {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.in_flight.remove(&key);
    if let Ok(info) = result {
        state.insert(key, info.clone(), capacity);
    }
}

async fn fetch(
    resolver: &dyn MetadataResolver,
    key: &CacheKey,
    proxy: &str,
) -> Result<ResolvedSongInfo> {
    let batch = resolver
        .resolve_batch(key.platform, key.quality, std::slice::from_ref(&key.id))
        .await?;

    // 只看第一条
    let entry = batch
        .results
        .into_iter()
        .next()
        .filter(|entry| entry.success)
        .ok_or(PlayerError::SongNotFound)?;

    info!(
        "解析成功 ({}): {}:{}:{}",
        resolver.name(),
        key.platform,
        key.quality,
        key.id
    );

    Ok(ResolvedSongInfo {
        name: entry.name.unwrap_or_default(),
        artist: entry.artist.unwrap_or_default(),
        album: entry.album.unwrap_or_default(),
        stream_url: to_proxy_url(&entry.stream_url, proxy),
        cover_url: entry
            .cover_url
            .map(|cover| to_proxy_url(&cover, proxy))
            .unwrap_or_default(),
        lyric_text: entry.lyric_text.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::api::{ResolveBatch, ResolvedEntry};

    /// 统计调用次数的解析器，`fail` 为真时总是返回错误
    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
        success: bool,
    }

    impl CountingResolver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
                success: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataResolver for CountingResolver {
        fn name(&self) -> &str {
            "counting"
        }

        async fn resolve_batch(
            &self,
            _platform: Platform,
            _quality: AudioQuality,
            ids: &[String],
        ) -> Result<ResolveBatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(PlayerError::ResolutionFailed("HTTP 502".to_string()));
            }
            let id = &ids[0];
            Ok(ResolveBatch {
                results: vec![ResolvedEntry {
                    id: id.clone(),
                    success: self.success,
                    stream_url: format!("https://cdn.example.com/{}.mp3", id),
                    cover_url: Some(format!("https://cdn.example.com/{}.jpg", id)),
                    lyric_text: Some("[00:01.00]la".to_string()),
                    name: Some(format!("Song {}", id)),
                    artist: Some("Singer".to_string()),
                    album: None,
                }],
                total: 1,
                success_count: 1,
                fail_count: 0,
            })
        }
    }

    fn cache(resolver: Arc<CountingResolver>) -> SongInfoCache {
        SongInfoCache::new(resolver, DEFAULT_CAPACITY, "/api/stream")
    }

    #[tokio::test]
    async fn test_hit_skips_resolver() {
        let resolver = CountingResolver::new();
        let cache = cache(Arc::clone(&resolver));

        let first = cache.resolve("1", Platform::Netease, AudioQuality::High).await.unwrap();
        let second = cache.resolve("1", Platform::Netease, AudioQuality::High).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.calls(), 1);

        // 音质不同就是不同的键
        cache.resolve("1", Platform::Netease, AudioQuality::Lossless).await.unwrap();
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_urls_are_proxied() {
        let resolver = CountingResolver::new();
        let cache = cache(resolver);
        let info = cache.resolve("7", Platform::Qq, AudioQuality::High).await.unwrap();
        assert_eq!(
            info.stream_url,
            "/api/stream?url=https%3A%2F%2Fcdn.example.com%2F7.mp3"
        );
        assert_eq!(
            info.cover_url,
            "/api/stream?url=https%3A%2F%2Fcdn.example.com%2F7.jpg"
        );
        assert_eq!(info.album, "");
        assert_eq!(info.name, "Song 7");
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_resolution() {
        let resolver = CountingResolver::new();
        let cache = cache(Arc::clone(&resolver));

        let (a, b) = tokio::join!(
            cache.resolve("1", Platform::Kuwo, AudioQuality::High),
            cache.resolve("1", Platform::Kuwo, AudioQuality::High),
        );
        assert_eq!(resolver.calls(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared_and_not_cached() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail: true,
            success: true,
        });
        let cache = cache(Arc::clone(&resolver));

        let (a, b) = tokio::join!(
            cache.resolve("1", Platform::Kuwo, AudioQuality::High),
            cache.resolve("1", Platform::Kuwo, AudioQuality::High),
        );
        assert_eq!(resolver.calls(), 1);
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);

        let _ = cache.resolve("1", Platform::Kuwo, AudioQuality::High).await;
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsuccessful_entry_is_not_found() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail: false,
            success: false,
        });
        let cache = cache(resolver);
        let err = cache.resolve("1", Platform::Migu, AudioQuality::High).await.unwrap_err();
        assert_eq!(err, PlayerError::SongNotFound);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest_insert() {
        let resolver = CountingResolver::new();
        let cache = cache(Arc::clone(&resolver));

        for i in 0..=DEFAULT_CAPACITY {
            cache
                .resolve(&i.to_string(), Platform::Netease, AudioQuality::High)
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        assert_eq!(resolver.calls(), DEFAULT_CAPACITY + 1);
        assert!(!cache.contains(&CacheKey::new("0", Platform::Netease, AudioQuality::High)));

        for i in 1..=DEFAULT_CAPACITY {
            cache
                .resolve(&i.to_string(), Platform::Netease, AudioQuality::High)
                .await
                .unwrap();
        }
        assert_eq!(resolver.calls(), DEFAULT_CAPACITY + 1);

        cache.resolve("0", Platform::Netease, AudioQuality::High).await.unwrap();
        assert_eq!(resolver.calls(), DEFAULT_CAPACITY + 2);
    }
}
