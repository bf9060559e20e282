//! 播放核心的错误类型

use thiserror::Error;

/// 播放核心错误
///
/// 需要 `Clone`：同一次解析失败要原样分发给所有等待者。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// 解析请求超时
    #[error("歌曲解析超时")]
    ResolutionTimeout,

    /// 非 2xx 响应或响应格式错误
    #[error("歌曲解析失败: {0}")]
    ResolutionFailed(String),

    /// 解析接口没有返回可用条目
    #[error("未找到歌曲")]
    SongNotFound,

    /// 媒体输出在加载 URL 之后报告的错误
    #[error("媒体播放错误: {0}")]
    MediaPlaybackError(String),

    /// 持久化存储不可用
    #[error("存储不可用: {0}")]
    StorageUnavailable(String),
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlayerError::ResolutionTimeout
        } else {
            PlayerError::ResolutionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::StorageUnavailable(err.to_string())
    }
}

/// 播放核心结果类型
pub type Result<T> = std::result::Result<T, PlayerError>;
