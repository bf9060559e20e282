use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, SongInfoCache};
use crate::error::Result;
use crate::lyrics::{active_line_index, LyricLine};
use crate::player::engine::{LoadTicket, PlaybackEngine, ResolutionOutcome};
use crate::player::output::{MediaEvent, MediaOutput};
use crate::player::queue::{QueueManager, QueueTransition};
use crate::player::types::{
    AdvanceReason, AudioQuality, PlayMode, PlayerSnapshot, QueueState, ResolvedSongInfo, Track,
};
use crate::storage::PlayerStore;
use crate::utils::LrcParser;

/// 回到播放服务的事件
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// 后台解析完成
    Resolved {
        generation: u64,
        track: Track,
        result: Result<ResolvedSongInfo>,
    },
    /// 媒体输出上报的事件，`source` 为 `MediaOutput::set_source` 收到的标识
    Media { source: u64, event: MediaEvent },
}

/// 播放服务
///
/// 持有队列、引擎、缓存与存储，所有修改都经过 `&mut self`。
/// 解析在 tokio 任务中进行，完成后通过内部通道送回，
/// 由 [`process_next_event`](Self::process_next_event) 逐个应用。
/// 触发加载的方法需要在 tokio 运行时内调用。
pub struct PlayerService {
    queue: QueueManager,
    engine: PlaybackEngine,
    cache: SongInfoCache,
    store: PlayerStore,
    last_track: Option<Track>,
    event_tx: UnboundedSender<PlayerEvent>,
    event_rx: UnboundedReceiver<PlayerEvent>,
}

impl PlayerService {
    /// 创建播放服务，使用默认音量与音质
    pub fn new(cache: SongInfoCache, store: PlayerStore, output: Box<dyn MediaOutput>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            queue: QueueManager::new(),
            engine: PlaybackEngine::new(output, 1.0, AudioQuality::default()),
            cache,
            store,
            last_track: None,
            event_tx,
            event_rx,
        }
    }

    /// 从存储恢复队列、模式、音量与音质，不会开始播放
    pub fn restore(&mut self) {
        let state = self.store.load();
        self.engine.unload();
        self.engine.set_volume(state.volume);
        self.engine.set_quality(state.quality);
        self.queue = QueueManager::restore(state.queue, state.current_index, state.play_mode);
        self.last_track = state.last_track;
        info!(
            "已恢复播放状态: 队列{}首, 当前第{}首",
            self.queue.len(),
            self.queue.current_index() + 1
        );
    }

    /// 媒体后端用来上报事件的发送端
    pub fn event_sender(&self) -> UnboundedSender<PlayerEvent> {
        self.event_tx.clone()
    }

    // ---- 队列操作 ----

    /// 替换队列并从 `start_index` 开始播放
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) {
        if tracks.is_empty() {
            self.clear();
            return;
        }
        let index = self.queue.set_queue(tracks, start_index);
        info!("设置播放队列: {}首, 从第{}首开始", self.queue.len(), index + 1);
        self.persist_queue();
        self.start_current();
    }

    /// 追加到队尾，不影响当前播放
    pub fn add_to_queue(&mut self, track: Track) {
        debug!("加入队列: {} - {}", track.name, track.artist);
        self.queue.add(track);
        self.store.save_queue(self.queue.tracks());
    }

    /// 清空队列并停止播放
    pub fn clear(&mut self) {
        info!("清空播放队列");
        self.queue.clear();
        self.engine.unload();
        self.persist_queue();
    }

    pub fn next(&mut self) {
        self.advance(AdvanceReason::UserNext);
    }

    pub fn prev(&mut self) {
        self.advance(AdvanceReason::UserPrev);
    }

    pub fn cycle_play_mode(&mut self) -> PlayMode {
        let mode = self.queue.cycle_mode();
        info!("播放模式切换为: {:?}", mode);
        self.store.save_play_mode(mode);
        mode
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.queue.set_mode(mode);
        self.store.save_play_mode(mode);
    }

    // ---- 播放控制 ----

    /// 播放当前曲目，尚未加载时先加载
    pub fn play(&mut self) {
        let Some(track) = self.queue.current() else {
            debug!("队列为空，忽略播放");
            return;
        };
        if self.engine.needs_load(track) {
            self.start_current();
        } else {
            self.engine.play();
        }
    }

    /// 播放指定曲目：已在队列中则跳转，否则追加到队尾
    pub fn play_track(&mut self, track: Track) {
        let index = match self.queue.position_of(&track) {
            Some(index) => index,
            None => {
                self.queue.add(track);
                self.queue.len() - 1
            }
        };

        if index == self.queue.current_index() {
            self.persist_queue();
            self.play();
            return;
        }

        self.queue.jump_to(index);
        self.persist_queue();
        self.start_current();
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    pub fn toggle_play(&mut self) {
        if self.engine.position().is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// 跳转到指定时间，返回实际位置
    pub fn seek(&mut self, time: f64) -> f64 {
        self.engine.seek(time)
    }

    pub fn set_volume(&mut self, volume: f64) {
        if let Some(volume) = self.engine.set_volume(volume) {
            self.store.save_volume(volume);
        }
    }

    /// 切换音质，当前曲目以新音质重新解析
    pub fn set_audio_quality(&mut self, quality: AudioQuality) {
        if !self.engine.set_quality(quality) {
            return;
        }
        info!("音质切换为: {}", quality);
        self.store.save_quality(quality);

        let reload = self
            .queue
            .current()
            .is_some_and(|track| self.engine.is_loaded(track));
        if reload {
            self.load_current();
        }
    }

    // ---- 只读状态 ----

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            current_track: self.queue.current().cloned(),
            queue: self.queue.tracks().to_vec(),
            current_index: self.queue.current_index(),
            play_mode: self.queue.mode(),
            quality: self.engine.quality(),
            position: self.engine.position(),
            volume: self.engine.volume(),
            last_error: self.engine.last_error().cloned(),
        }
    }

    pub fn state(&self) -> QueueState {
        match self.queue.current() {
            None => QueueState::Empty,
            Some(track) if self.engine.position().is_playing => QueueState::Playing(track.clone()),
            Some(track) => QueueState::Idle(track.clone()),
        }
    }

    /// 上次播放的曲目，用于冷启动展示
    pub fn last_track(&self) -> Option<&Track> {
        self.last_track.as_ref()
    }

    /// 当前音源标识，与最近一次 `set_source` 收到的值相同
    pub fn source_id(&self) -> u64 {
        self.engine.generation()
    }

    pub fn resolved(&self) -> Option<&ResolvedSongInfo> {
        self.engine.resolved()
    }

    pub fn take_last_error(&mut self) -> Option<crate::error::PlayerError> {
        self.engine.take_last_error()
    }

    /// 曲目的歌词
    ///
    /// 当前曲目取已解析的歌词；其它曲目只查缓存，不会触发解析。
    pub fn lyric_lines(&self, track: &Track) -> Vec<LyricLine> {
        let is_current = self
            .queue
            .current()
            .is_some_and(|current| current.same_entity(track));
        if is_current && self.engine.is_loaded(track) && self.engine.resolved().is_some() {
            return self.engine.lyrics().to_vec();
        }

        let key = CacheKey::new(track.id.as_str(), track.platform, self.engine.quality());
        self.cache
            .peek(&key)
            .map(|info| LrcParser::parse(&info.lyric_text))
            .unwrap_or_default()
    }

    /// 当前歌词中时间 `t` 对应的行
    pub fn active_lyric_index(&self, t: f64) -> Option<usize> {
        active_line_index(self.engine.lyrics(), t)
    }

    // ---- 事件 ----

    /// 等待并处理下一个事件，通道关闭时返回 `false`
    pub async fn process_next_event(&mut self) -> bool {
        match self.event_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// 处理所有已到达的事件，返回处理数量
    pub fn process_pending_events(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
            count += 1;
        }
        count
    }

    /// 持续处理事件
    pub async fn run(&mut self) {
        debug!("播放服务事件循环启动");
        while self.process_next_event().await {}
        debug!("播放服务事件循环结束");
    }

    pub fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Resolved {
                generation,
                track,
                result,
            } => match self.engine.apply_resolution(generation, result) {
                ResolutionOutcome::Stale => {}
                ResolutionOutcome::Loaded(info) => self.enrich_current(&track, &info),
                ResolutionOutcome::Failed(e) => {
                    warn!("跳过无法播放的曲目 {} - {}: {}", track.name, track.artist, e);
                    self.advance(AdvanceReason::TrackFailed);
                }
            },
            PlayerEvent::Media { source, event } => {
                if let Some(reason) = self.engine.handle_media_event(source, event) {
                    self.advance(reason);
                }
            }
        }
    }

    // ---- 内部 ----

    fn advance(&mut self, reason: AdvanceReason) {
        let elapsed = self
            .queue
            .current()
            .filter(|track| self.engine.is_loaded(track))
            .map(|_| self.engine.position().current_time);
        let transition = self.queue.advance(reason, elapsed);
        debug!("切歌 {:?} -> {:?}", reason, transition);

        match transition {
            QueueTransition::Jump(_) => {
                self.store.save_index(self.queue.current_index());
                self.start_current();
            }
            QueueTransition::Restart => {
                let needs_load = self
                    .queue
                    .current()
                    .is_some_and(|track| self.engine.needs_load(track));
                if needs_load {
                    self.start_current();
                } else {
                    self.engine.restart();
                }
            }
            QueueTransition::Stop => {
                info!("已到队列末尾，停止播放");
                self.engine.pause();
            }
            QueueTransition::Stay => {}
        }
    }

    /// 加载当前曲目并设置播放意图
    fn start_current(&mut self) {
        self.load_current();
        self.engine.play();
    }

    fn load_current(&mut self) {
        let Some(track) = self.queue.current().cloned() else {
            return;
        };
        let ticket = self.engine.begin_load(&track);
        self.store.save_last_track(&track);
        self.last_track = Some(track);
        self.spawn_resolution(ticket);
    }

    fn spawn_resolution(&self, ticket: LoadTicket) {
        let cache = self.cache.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let LoadTicket {
                generation,
                track,
                quality,
            } = ticket;
            let result = cache.resolve(&track.id, track.platform, quality).await;
            if tx
                .send(PlayerEvent::Resolved {
                    generation,
                    track,
                    result,
                })
                .is_err()
            {
                debug!("播放服务已关闭，丢弃解析结果 #{}", generation);
            }
        });
    }

    /// 解析结果补全当前曲目的封面与专辑
    fn enrich_current(&mut self, track: &Track, info: &ResolvedSongInfo) {
        let Some(current) = self.queue.current_mut() else {
            return;
        };
        if !current.same_entity(track) {
            return;
        }

        let mut changed = false;
        if current.cover.is_none() && !info.cover_url.is_empty() {
            current.cover = Some(info.cover_url.clone());
            changed = true;
        }
        if current.album.is_none() && !info.album.is_empty() {
            current.album = Some(info.album.clone());
            changed = true;
        }
        if changed {
            self.store.save_queue(self.queue.tracks());
        }
    }

    fn persist_queue(&mut self) {
        self.store.save_queue(self.queue.tracks());
        self.store.save_index(self.queue.current_index());
    }
}
