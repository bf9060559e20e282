//! 播放引擎
//!
//! 独占唯一的媒体输出，维护播放意图、加载状态、进度与音量。
//! 每次加载都会递增 `generation`，迟到的解析结果或旧音源的事件
//! 通过比对 generation 直接丢弃。

use tracing::{debug, info, warn};

use crate::error::{PlayerError, Result};
use crate::lyrics::LyricLine;
use crate::player::output::{MediaEvent, MediaOutput};
use crate::player::types::{AdvanceReason, AudioQuality, PlaybackPosition, Platform, ResolvedSongInfo, Track};
use crate::utils::LrcParser;

/// 一次加载请求，解析完成后凭 `generation` 回到引擎
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    pub generation: u64,
    pub track: Track,
    pub quality: AudioQuality,
}

/// 解析结果交给引擎后的处理结论
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// 结果属于已经切走的曲目，已丢弃
    Stale,
    /// 音源已设置
    Loaded(ResolvedSongInfo),
    /// 解析失败，需要跳过当前曲目
    Failed(PlayerError),
}

/// 播放引擎
pub struct PlaybackEngine {
    output: Box<dyn MediaOutput>,
    position: PlaybackPosition,
    volume: f64,
    quality: AudioQuality,
    generation: u64,
    /// 当前 generation 对应的曲目身份
    loaded: Option<(String, Platform)>,
    /// 已经把音源交给输出的 generation
    source_generation: Option<u64>,
    resolved: Option<ResolvedSongInfo>,
    lyrics: Vec<LyricLine>,
    last_error: Option<PlayerError>,
}

impl PlaybackEngine {
    pub fn new(mut output: Box<dyn MediaOutput>, volume: f64, quality: AudioQuality) -> Self {
        let volume = clamp_volume(volume).unwrap_or(1.0);
        output.set_volume(volume);
        Self {
            output,
            position: PlaybackPosition::default(),
            volume,
            quality,
            generation: 0,
            loaded: None,
            source_generation: None,
            resolved: None,
            lyrics: Vec::new(),
            last_error: None,
        }
    }

    /// 开始加载曲目：旧请求作废，进度归零，进入加载状态
    pub fn begin_load(&mut self, track: &Track) -> LoadTicket {
        self.generation += 1;
        self.loaded = Some((track.id.clone(), track.platform));
        self.source_generation = None;
        self.resolved = None;
        self.lyrics.clear();
        self.position.current_time = 0.0;
        self.position.duration = 0.0;
        self.position.is_loading = true;
        self.output.set_source(None, self.generation);

        debug!(
            "开始加载 #{}: {} - {} ({}/{})",
            self.generation, track.name, track.artist, track.platform, self.quality
        );

        LoadTicket {
            generation: self.generation,
            track: track.clone(),
            quality: self.quality,
        }
    }

    /// 应用解析结果，generation 不匹配时丢弃
    pub fn apply_resolution(
        &mut self,
        generation: u64,
        result: Result<ResolvedSongInfo>,
    ) -> ResolutionOutcome {
        if generation != self.generation {
            debug!(
                "丢弃过期的解析结果: #{} (当前 #{})",
                generation, self.generation
            );
            return ResolutionOutcome::Stale;
        }

        match result {
            Ok(info) => {
                self.lyrics = LrcParser::parse(&info.lyric_text);
                self.output.set_source(Some(&info.stream_url), generation);
                self.source_generation = Some(generation);
                if self.position.is_playing {
                    self.output.play();
                }
                info!(
                    "音源就绪: {} - {}, 歌词{}行",
                    info.name,
                    info.artist,
                    self.lyrics.len()
                );
                self.resolved = Some(info.clone());
                ResolutionOutcome::Loaded(info)
            }
            Err(e) => {
                warn!("解析失败 #{}: {}", generation, e);
                self.position.is_loading = false;
                self.last_error = Some(e.clone());
                ResolutionOutcome::Failed(e)
            }
        }
    }

    /// 处理媒体输出事件，需要切歌时返回原因
    ///
    /// `source` 是输出在 `set_source` 时拿到的标识；不属于当前音源的事件直接丢弃。
    pub fn handle_media_event(&mut self, source: u64, event: MediaEvent) -> Option<AdvanceReason> {
        if source != self.generation || self.source_generation != Some(source) {
            debug!("忽略旧音源 #{} 的媒体事件: {:?}", source, event);
            return None;
        }

        match event {
            MediaEvent::TimeUpdate(time) => {
                self.position.current_time = time;
                None
            }
            MediaEvent::LoadedMetadata { duration } => {
                self.position.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
                self.position.is_loading = false;
                None
            }
            MediaEvent::Ended => Some(AdvanceReason::TrackEnded),
            MediaEvent::Error(message) => {
                warn!("媒体播放错误: {}", message);
                self.position.is_loading = false;
                self.last_error = Some(PlayerError::MediaPlaybackError(message));
                Some(AdvanceReason::TrackFailed)
            }
            MediaEvent::Waiting => {
                self.position.is_loading = true;
                None
            }
            MediaEvent::CanPlay => {
                self.position.is_loading = false;
                None
            }
        }
    }

    pub fn play(&mut self) {
        self.position.is_playing = true;
        if self.has_source() {
            self.output.play();
        }
    }

    pub fn pause(&mut self) {
        self.position.is_playing = false;
        if self.has_source() {
            self.output.pause();
        }
    }

    /// 当前曲目从头播放，保持播放意图
    pub fn restart(&mut self) {
        self.position.current_time = 0.0;
        self.output.seek(0.0);
        if self.position.is_playing && self.has_source() {
            self.output.play();
        }
    }

    /// 跳转，限制在 `[0, duration]` 内（时长未知时只限制下界）
    pub fn seek(&mut self, time: f64) -> f64 {
        let mut target = if time.is_finite() { time.max(0.0) } else { 0.0 };
        if self.position.duration > 0.0 {
            target = target.min(self.position.duration);
        }
        self.position.current_time = target;
        self.output.seek(target);
        target
    }

    /// 设置音量，返回实际生效的值；NaN 被忽略
    pub fn set_volume(&mut self, volume: f64) -> Option<f64> {
        let volume = clamp_volume(volume)?;
        self.volume = volume;
        self.output.set_volume(volume);
        Some(volume)
    }

    /// 切换音质，返回是否发生变化
    pub fn set_quality(&mut self, quality: AudioQuality) -> bool {
        if self.quality == quality {
            return false;
        }
        self.quality = quality;
        true
    }

    /// 完全卸载：作废进行中的解析，停止并释放音源
    pub fn unload(&mut self) {
        self.generation += 1;
        self.loaded = None;
        self.source_generation = None;
        self.resolved = None;
        self.lyrics.clear();
        self.position = PlaybackPosition::default();
        self.output.pause();
        self.output.set_source(None, self.generation);
    }

    /// 曲目是否就是当前加载（或正在加载）的那首
    pub fn is_loaded(&self, track: &Track) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|(id, platform)| *id == track.id && *platform == track.platform)
    }

    /// 曲目没有音源、也不在加载中时需要重新加载
    pub fn needs_load(&self, track: &Track) -> bool {
        !self.is_loaded(track) || (!self.has_source() && !self.position.is_loading)
    }

    fn has_source(&self) -> bool {
        self.source_generation == Some(self.generation)
    }

    pub fn position(&self) -> PlaybackPosition {
        self.position
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn quality(&self) -> AudioQuality {
        self.quality
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resolved(&self) -> Option<&ResolvedSongInfo> {
        self.resolved.as_ref()
    }

    pub fn lyrics(&self) -> &[LyricLine] {
        &self.lyrics
    }

    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<PlayerError> {
        self.last_error.take()
    }
}

fn clamp_volume(volume: f64) -> Option<f64> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Source(Option<String>),
        Play,
        Pause,
        Seek(f64),
        Volume(f64),
    }

    #[derive(Clone, Default)]
    struct RecordingOutput {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl MediaOutput for RecordingOutput {
        fn set_source(&mut self, url: Option<&str>, _source: u64) {
            self.calls.lock().unwrap().push(Call::Source(url.map(str::to_string)));
        }
        fn play(&mut self) {
            self.calls.lock().unwrap().push(Call::Play);
        }
        fn pause(&mut self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }
        fn seek(&mut self, time: f64) {
            self.calls.lock().unwrap().push(Call::Seek(time));
        }
        fn set_volume(&mut self, volume: f64) {
            self.calls.lock().unwrap().push(Call::Volume(volume));
        }
    }

    fn engine() -> (PlaybackEngine, Arc<Mutex<Vec<Call>>>) {
        let output = RecordingOutput::default();
        let calls = Arc::clone(&output.calls);
        (
            PlaybackEngine::new(Box::new(output), 1.0, AudioQuality::High),
            calls,
        )
    }

    fn info(url: &str) -> ResolvedSongInfo {
        ResolvedSongInfo {
            name: "Song".to_string(),
            artist: "Artist".to_string(),
            stream_url: url.to_string(),
            lyric_text: "[00:01.00]hello".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stale_resolution_is_discarded() {
        let (mut engine, calls) = engine();
        let a = Track::new("a", "A", "X", Platform::Netease);
        let b = Track::new("b", "B", "X", Platform::Netease);
        engine.play();

        let ticket_a = engine.begin_load(&a);
        let ticket_b = engine.begin_load(&b);

        assert_eq!(
            engine.apply_resolution(ticket_a.generation, Ok(info("/a.mp3"))),
            ResolutionOutcome::Stale
        );
        assert!(engine.resolved().is_none());
        assert!(!calls.lock().unwrap().contains(&Call::Source(Some("/a.mp3".to_string()))));

        let outcome = engine.apply_resolution(ticket_b.generation, Ok(info("/b.mp3")));
        assert!(matches!(outcome, ResolutionOutcome::Loaded(_)));
        let calls = calls.lock().unwrap();
        assert_eq!(calls[calls.len() - 2], Call::Source(Some("/b.mp3".to_string())));
        assert_eq!(calls[calls.len() - 1], Call::Play);
    }

    #[test]
    fn test_paused_intent_does_not_autoplay() {
        let (mut engine, calls) = engine();
        let t = Track::new("a", "A", "X", Platform::Qq);
        let ticket = engine.begin_load(&t);
        engine.apply_resolution(ticket.generation, Ok(info("/a.mp3")));
        assert!(!calls.lock().unwrap().contains(&Call::Play));
        assert_eq!(engine.lyrics().len(), 1);
    }

    #[test]
    fn test_loading_flag_follows_events() {
        let (mut engine, _) = engine();
        let t = Track::new("a", "A", "X", Platform::Qq);
        let ticket = engine.begin_load(&t);
        assert!(engine.position().is_loading);

        engine.apply_resolution(ticket.generation, Ok(info("/a.mp3")));
        assert!(engine.position().is_loading);

        engine.handle_media_event(engine.generation(), MediaEvent::LoadedMetadata { duration: 200.0 });
        assert!(!engine.position().is_loading);
        assert_eq!(engine.position().duration, 200.0);

        engine.handle_media_event(engine.generation(), MediaEvent::Waiting);
        assert!(engine.position().is_loading);
        engine.handle_media_event(engine.generation(), MediaEvent::CanPlay);
        assert!(!engine.position().is_loading);

        engine.handle_media_event(engine.generation(), MediaEvent::TimeUpdate(12.5));
        assert_eq!(engine.position().current_time, 12.5);
    }

    #[test]
    fn test_end_and_error_signal_advance() {
        let (mut engine, _) = engine();
        let t = Track::new("a", "A", "X", Platform::Qq);
        let ticket = engine.begin_load(&t);
        engine.apply_resolution(ticket.generation, Ok(info("/a.mp3")));

        assert_eq!(
            engine.handle_media_event(engine.generation(), MediaEvent::Ended),
            Some(AdvanceReason::TrackEnded)
        );
        assert_eq!(
            engine.handle_media_event(engine.generation(), MediaEvent::Error("decode".to_string())),
            Some(AdvanceReason::TrackFailed)
        );
        assert_eq!(
            engine.last_error(),
            Some(&PlayerError::MediaPlaybackError("decode".to_string()))
        );
    }

    #[test]
    fn test_events_without_source_are_ignored() {
        let (mut engine, _) = engine();
        let t = Track::new("a", "A", "X", Platform::Qq);
        engine.begin_load(&t);
        assert_eq!(engine.handle_media_event(engine.generation(), MediaEvent::Ended), None);
        engine.handle_media_event(engine.generation(), MediaEvent::TimeUpdate(30.0));
        assert_eq!(engine.position().current_time, 0.0);
    }

    #[test]
    fn test_events_from_replaced_source_are_ignored() {
        let (mut engine, _) = engine();
        let a = Track::new("a", "A", "X", Platform::Qq);
        let b = Track::new("b", "B", "X", Platform::Qq);
        engine.play();

        let ticket_a = engine.begin_load(&a);
        engine.apply_resolution(ticket_a.generation, Ok(info("/a.mp3")));
        let ticket_b = engine.begin_load(&b);
        engine.apply_resolution(ticket_b.generation, Ok(info("/b.mp3")));

        engine.handle_media_event(ticket_a.generation, MediaEvent::TimeUpdate(95.0));
        assert_eq!(engine.position().current_time, 0.0);
        assert_eq!(
            engine.handle_media_event(ticket_a.generation, MediaEvent::Ended),
            None
        );
        assert_eq!(
            engine.handle_media_event(ticket_b.generation, MediaEvent::Ended),
            Some(AdvanceReason::TrackEnded)
        );
    }

    #[test]
    fn test_resolution_failure_clears_loading() {
        let (mut engine, _) = engine();
        let t = Track::new("a", "A", "X", Platform::Kuwo);
        let ticket = engine.begin_load(&t);
        let outcome = engine.apply_resolution(ticket.generation, Err(PlayerError::SongNotFound));
        assert_eq!(outcome, ResolutionOutcome::Failed(PlayerError::SongNotFound));
        assert!(!engine.position().is_loading);
        assert_eq!(engine.take_last_error(), Some(PlayerError::SongNotFound));
        assert!(engine.last_error().is_none());
    }

    #[test]
    fn test_seek_and_volume_are_clamped() {
        let (mut engine, calls) = engine();
        assert_eq!(engine.seek(-4.0), 0.0);
        assert_eq!(engine.seek(500.0), 500.0);

        let t = Track::new("a", "A", "X", Platform::Qq);
        let ticket = engine.begin_load(&t);
        engine.apply_resolution(ticket.generation, Ok(info("/a.mp3")));
        engine.handle_media_event(engine.generation(), MediaEvent::LoadedMetadata { duration: 120.0 });
        assert_eq!(engine.seek(500.0), 120.0);
        assert_eq!(engine.position().current_time, 120.0);

        assert_eq!(engine.set_volume(1.7), Some(1.0));
        assert_eq!(engine.set_volume(-0.2), Some(0.0));
        assert_eq!(engine.set_volume(f64::NAN), None);
        assert_eq!(engine.volume(), 0.0);
        assert!(calls.lock().unwrap().contains(&Call::Seek(120.0)));
    }

    #[test]
    fn test_unload_detaches_source() {
        let (mut engine, calls) = engine();
        let t = Track::new("a", "A", "X", Platform::Qq);
        engine.play();
        let ticket = engine.begin_load(&t);
        engine.apply_resolution(ticket.generation, Ok(info("/a.mp3")));
        engine.unload();

        assert!(!engine.position().is_playing);
        assert!(!engine.is_loaded(&t));
        assert_eq!(calls.lock().unwrap().last(), Some(&Call::Source(None)));
    }
}
