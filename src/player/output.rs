//! 媒体输出抽象
//!
//! 真正的解码与发声由平台提供（浏览器 audio 元素、桌面音频后端等），
//! 这里只约定引擎需要的最小接口和它回传的事件。

use tracing::trace;

/// 媒体输出回传的事件
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// 播放位置更新（秒）
    TimeUpdate(f64),
    /// 元数据就绪，时长已知
    LoadedMetadata { duration: f64 },
    /// 播放结束
    Ended,
    /// 解码或网络错误
    Error(String),
    /// 缓冲中
    Waiting,
    /// 可以播放
    CanPlay,
}

/// 可播放的媒体输出
///
/// 只有 [`PlaybackEngine`](crate::player::PlaybackEngine) 可以持有并操作它。
pub trait MediaOutput: Send {
    /// 设置音源，`None` 表示卸载当前音源
    ///
    /// `source` 标识这次设置的音源，上报 [`MediaEvent`] 时必须原样带回，
    /// 旧音源迟到的事件据此丢弃。
    fn set_source(&mut self, url: Option<&str>, source: u64);

    fn play(&mut self);

    fn pause(&mut self);

    /// 跳转到指定位置（秒）
    fn seek(&mut self, time: f64);

    /// 音量，范围 0..=1
    fn set_volume(&mut self, volume: f64);
}

/// 无声输出，用于命令行等没有音频后端的场景
#[derive(Debug, Default)]
pub struct NullOutput;

impl MediaOutput for NullOutput {
    fn set_source(&mut self, url: Option<&str>, source: u64) {
        trace!("NullOutput 设置音源 #{}: {:?}", source, url);
    }

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn seek(&mut self, time: f64) {
        trace!("NullOutput 跳转: {:.2}s", time);
    }

    fn set_volume(&mut self, _volume: f64) {}
}
