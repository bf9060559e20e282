//! 播放状态持久化
//!
//! [`PersistenceAdapter`] 是简单的键值存储，值为 JSON。
//! [`PlayerStore`] 在其上提供带默认值的读写，并吞掉所有存储错误：
//! 存储不可用时播放器退化为纯内存运行。

mod file;

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::player::{AudioQuality, PlayMode, Track};

pub use file::JsonFileStorage;

/// 存储键
pub mod keys {
    pub const VOLUME: &str = "player_volume";
    pub const QUALITY: &str = "player_quality";
    pub const LAST_TRACK: &str = "player_last_track";
    pub const PLAYLIST: &str = "player_playlist";
    pub const CURRENT_INDEX: &str = "player_current_index";
    pub const PLAY_MODE: &str = "player_play_mode";
}

/// 键值存储接口
pub trait PersistenceAdapter: Send {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// 内存存储
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    values: HashMap<String, Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// 启动时恢复的播放状态
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub volume: f64,
    pub quality: AudioQuality,
    pub play_mode: PlayMode,
    pub queue: Vec<Track>,
    pub current_index: usize,
    pub last_track: Option<Track>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            quality: AudioQuality::default(),
            play_mode: PlayMode::default(),
            queue: Vec::new(),
            current_index: 0,
            last_track: None,
        }
    }
}

/// 带类型和默认值的播放器存储
pub struct PlayerStore {
    adapter: Box<dyn PersistenceAdapter>,
}

impl PlayerStore {
    pub fn new(adapter: Box<dyn PersistenceAdapter>) -> Self {
        Self { adapter }
    }

    /// 纯内存存储
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// 读取全部状态，缺失或损坏的键使用默认值
    pub fn load(&self) -> PersistedState {
        let defaults = PersistedState::default();
        let state = PersistedState {
            volume: self.get_or(keys::VOLUME, defaults.volume),
            quality: self.get_or(keys::QUALITY, defaults.quality),
            play_mode: self.get_or(keys::PLAY_MODE, defaults.play_mode),
            queue: self.get_or(keys::PLAYLIST, defaults.queue),
            current_index: self.get_or(keys::CURRENT_INDEX, defaults.current_index),
            last_track: self.get_or(keys::LAST_TRACK, None),
        };
        debug!(
            "恢复播放状态: 队列{}首, 位置{}, 模式{:?}, 音质{}",
            state.queue.len(),
            state.current_index,
            state.play_mode,
            state.quality
        );
        state
    }

    pub fn save_volume(&mut self, volume: f64) {
        self.put(keys::VOLUME, &volume);
    }

    pub fn save_quality(&mut self, quality: AudioQuality) {
        self.put(keys::QUALITY, &quality);
    }

    pub fn save_play_mode(&mut self, mode: PlayMode) {
        self.put(keys::PLAY_MODE, &mode);
    }

    pub fn save_queue(&mut self, queue: &[Track]) {
        self.put(keys::PLAYLIST, &queue);
    }

    pub fn save_index(&mut self, index: usize) {
        self.put(keys::CURRENT_INDEX, &index);
    }

    pub fn save_last_track(&mut self, track: &Track) {
        self.put(keys::LAST_TRACK, track);
    }

    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.adapter.get(key) {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("存储项 {} 无法解析，使用默认值: {}", key, e);
                default
            }),
            Ok(None) => default,
            Err(e) => {
                warn!("读取存储项 {} 失败，使用默认值: {}", key, e);
                default
            }
        }
    }

    fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("存储项 {} 序列化失败: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.adapter.set(key, value) {
            warn!("写入存储项 {} 失败，仅保留在内存中: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use crate::player::Platform;

    struct BrokenStorage;

    impl PersistenceAdapter for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(PlayerError::StorageUnavailable("disk gone".to_string()))
        }

        fn set(&mut self, _key: &str, _value: Value) -> Result<()> {
            Err(PlayerError::StorageUnavailable("disk gone".to_string()))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(PlayerError::StorageUnavailable("disk gone".to_string()))
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let store = PlayerStore::in_memory();
        assert_eq!(store.load(), PersistedState::default());
        let state = store.load();
        assert_eq!(state.volume, 1.0);
        assert_eq!(state.quality, AudioQuality::High);
        assert_eq!(state.play_mode, PlayMode::Sequential);
    }

    #[test]
    fn test_save_and_load() {
        let mut store = PlayerStore::in_memory();
        let track = Track::new("9", "Song", "Singer", Platform::Kugou);
        store.save_volume(0.4);
        store.save_quality(AudioQuality::Lossless);
        store.save_play_mode(PlayMode::Shuffle);
        store.save_queue(std::slice::from_ref(&track));
        store.save_index(0);
        store.save_last_track(&track);

        let state = store.load();
        assert_eq!(state.volume, 0.4);
        assert_eq!(state.quality, AudioQuality::Lossless);
        assert_eq!(state.play_mode, PlayMode::Shuffle);
        assert_eq!(state.queue, vec![track.clone()]);
        assert_eq!(state.last_track, Some(track));
    }

    #[test]
    fn test_wire_format_matches_keys() {
        let mut memory = MemoryStorage::new();
        memory.set(keys::PLAY_MODE, Value::from("loopOne")).unwrap();
        memory.set(keys::QUALITY, Value::from("bogus")).unwrap();
        let store = PlayerStore::new(Box::new(memory));
        let state = store.load();
        assert_eq!(state.play_mode, PlayMode::LoopOne);
        assert_eq!(state.quality, AudioQuality::High);
    }

    #[test]
    fn test_broken_storage_degrades_to_defaults() {
        let mut store = PlayerStore::new(Box::new(BrokenStorage));
        store.save_volume(0.2);
        store.save_queue(&[]);
        assert_eq!(store.load(), PersistedState::default());
    }
}
