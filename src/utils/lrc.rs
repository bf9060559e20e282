use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::lyrics::LyricLine;

// 匹配时间标签: [mm:ss.xx] 或 [mm:ss.xxx]，只认 ASCII 数字
static TIME_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([0-9]{2}):([0-9]{2})\.([0-9]{2,3})\]").expect("时间标签正则无效")
});

/// LRC歌词解析器
pub struct LrcParser;

impl LrcParser {
    /// 解析LRC格式的歌词
    ///
    /// 没有时间标签的行（包括 `[ar:...]` 之类的元数据）和去掉标签后
    /// 为空的行都会被丢弃；一行多个标签会展开成多条。
    /// 结果按时间稳定排序，空输入或无法识别的输入返回空列表。
    pub fn parse(content: &str) -> Vec<LyricLine> {
        let mut lines = Vec::new();

        for line in content.lines() {
            let mut timestamps = Vec::new();
            for cap in TIME_TAG.captures_iter(line) {
                let (Ok(mins), Ok(secs)) = (cap[1].parse::<u64>(), cap[2].parse::<u64>()) else {
                    continue;
                };
                // 两位按百分之一秒，三位按毫秒：右侧补零到三位
                let fraction = format!("{:0<3}", &cap[3]);
                let Ok(millis) = fraction.parse::<u64>() else {
                    continue;
                };
                timestamps.push((mins * 60 + secs) as f64 + millis as f64 / 1000.0);
            }

            if timestamps.is_empty() {
                continue;
            }

            let text = TIME_TAG.replace_all(line, "");
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            trace!("LRC解析: 原始行='{}', 提取文本='{}'", line, text);
            for time in timestamps {
                lines.push(LyricLine {
                    time,
                    text: text.to_string(),
                });
            }
        }

        // sort_by 是稳定排序，同一时间保持原有顺序
        lines.sort_by(|a, b| a.time.total_cmp(&b.time));
        lines
    }
}
