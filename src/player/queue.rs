//! 播放队列
//!
//! 队列只负责"下一首是谁"：根据播放模式和切歌原因一次性算出
//! 下一个状态，不触碰媒体输出。加载与播放由 [`PlayerService`] 完成。
//!
//! [`PlayerService`]: crate::player::PlayerService

use rand::Rng;

use crate::player::types::{AdvanceReason, PlayMode, Track};

/// 上一首按钮的"重播当前"阈值（秒）
pub const RESTART_THRESHOLD_SECS: f64 = 3.0;

/// 一次切歌计算的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTransition {
    /// 切换到指定位置并加载
    Jump(usize),
    /// 当前曲目从头播放
    Restart,
    /// 到达队尾，停止播放（位置不变）
    Stop,
    /// 什么都不做
    Stay,
}

/// 队列管理器
#[derive(Debug, Clone, Default)]
pub struct QueueManager {
    tracks: Vec<Track>,
    current_index: usize,
    mode: PlayMode,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从持久化数据恢复，位置会被收进合法范围
    pub fn restore(tracks: Vec<Track>, index: usize, mode: PlayMode) -> Self {
        let current_index = clamp_index(index, tracks.len());
        Self {
            tracks,
            current_index,
            mode,
        }
    }

    /// 整体替换队列，返回实际生效的位置
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> usize {
        self.current_index = clamp_index(start_index, tracks.len());
        self.tracks = tracks;
        self.current_index
    }

    /// 追加到队尾，不改变当前位置
    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = 0;
    }

    /// 直接跳到某个位置，越界时返回 `false`
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    /// 按身份查找曲目位置
    pub fn position_of(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t.same_entity(track))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        self.tracks.get_mut(self.current_index)
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    /// 轮换播放模式并返回新模式
    pub fn cycle_mode(&mut self) -> PlayMode {
        self.mode = self.mode.cycle();
        self.mode
    }

    /// 计算切歌结果并更新当前位置
    ///
    /// `elapsed` 为当前曲目已播放的秒数，未知时传 `None`。
    pub fn advance(&mut self, reason: AdvanceReason, elapsed: Option<f64>) -> QueueTransition {
        let transition = self.peek_advance(reason, elapsed);
        if let QueueTransition::Jump(index) = transition {
            self.current_index = index;
        }
        transition
    }

    /// 只计算，不修改状态
    pub fn peek_advance(&self, reason: AdvanceReason, elapsed: Option<f64>) -> QueueTransition {
        let len = self.tracks.len();
        if len == 0 {
            return QueueTransition::Stay;
        }
        let current = self.current_index;

        let transition = match reason {
            // 失败一律按顺序模式往后走，避免随机/循环模式下反复重试
            AdvanceReason::TrackFailed => sequential_next(current, len),
            AdvanceReason::UserPrev => {
                if elapsed.is_some_and(|secs| secs > RESTART_THRESHOLD_SECS) {
                    QueueTransition::Restart
                } else if self.mode == PlayMode::Loop {
                    QueueTransition::Jump((current + len - 1) % len)
                } else if current > 0 {
                    QueueTransition::Jump(current - 1)
                } else {
                    QueueTransition::Stay
                }
            }
            AdvanceReason::TrackEnded if self.mode == PlayMode::LoopOne => {
                QueueTransition::Restart
            }
            AdvanceReason::TrackEnded | AdvanceReason::UserNext => match self.mode {
                PlayMode::Sequential | PlayMode::LoopOne => sequential_next(current, len),
                PlayMode::Loop => QueueTransition::Jump((current + 1) % len),
                PlayMode::Shuffle => QueueTransition::Jump(random_other(current, len)),
            },
        };

        // 落在当前位置（单曲队列的循环/随机）就是重播
        match transition {
            QueueTransition::Jump(index) if index == current => QueueTransition::Restart,
            other => other,
        }
    }
}

fn clamp_index(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        index.min(len - 1)
    }
}

fn sequential_next(current: usize, len: usize) -> QueueTransition {
    if current + 1 < len {
        QueueTransition::Jump(current + 1)
    } else {
        QueueTransition::Stop
    }
}

/// 均匀随机选一个不同于 `current` 的位置，只有一首时返回 `current`
fn random_other(current: usize, len: usize) -> usize {
    if len <= 1 {
        return current;
    }
    let mut rng = rand::rng();
    let pick = rng.random_range(0..len - 1);
    if pick >= current {
        pick + 1
    } else {
        pick
    }
}
