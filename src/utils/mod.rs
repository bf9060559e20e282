mod lrc;
mod url;

pub use lrc::LrcParser;
pub use url::{to_proxy_url, DEFAULT_STREAM_PROXY};

/// 格式化时间 (秒 -> m:ss)，非法值显示为 0:00
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
