use serde::{Deserialize, Serialize};

pub use crate::utils::LrcParser;

/// 表示单行歌词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// 开始时间（秒）
    pub time: f64,
    /// 歌词文本，非空
    pub text: String,
}

/// 根据播放时间找到当前行
///
/// 当前行是最后一个 `time <= t` 的行；时间相同的多行中排在后面的胜出。
/// `t` 早于第一行时返回 `None`。`lines` 必须按时间排好序。
pub fn active_line_index(lines: &[LyricLine], t: f64) -> Option<usize> {
    if t.is_nan() {
        return None;
    }
    lines.partition_point(|line| line.time <= t).checked_sub(1)
}
