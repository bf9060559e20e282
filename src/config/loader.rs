use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::utils::DEFAULT_STREAM_PROXY;

/// 覆盖配置文件中 API Key 的环境变量
pub const API_KEY_ENV: &str = "TUNEHUB_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// 解析接口设置
    pub api: ApiConfig,

    /// 播放器设置
    pub player: PlayerConfig,

    /// 状态存储设置
    pub storage: StorageConfig,
}

/// 解析接口配置
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// 接口根地址
    pub base_url: String,

    /// API Key，可由环境变量覆盖
    pub api_key: Option<String>,

    /// 请求超时（秒）
    pub timeout_secs: u64,

    /// 结果为空时是否重试一次
    pub retry_on_empty: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tunehub.sayqz.com/api".to_string(),
            api_key: None,
            timeout_secs: 10,
            retry_on_empty: true,
        }
    }
}

// API Key 不进日志
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_on_empty", &self.retry_on_empty)
            .finish()
    }
}

/// 播放器配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PlayerConfig {
    /// 流媒体代理路径
    pub stream_proxy: String,

    /// 歌曲信息缓存容量
    pub cache_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            stream_proxy: DEFAULT_STREAM_PROXY.to_string(),
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

/// 状态存储配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// 状态文件路径
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let pkg_name = env!("CARGO_PKG_NAME");
        let state_file = dirs::data_dir()
            .map(|p| p.join(pkg_name).join("state.json"))
            .unwrap_or_else(|| PathBuf::from(format!("{}-state.json", pkg_name)));

        Self {
            state_file: state_file.to_string_lossy().to_string(),
        }
    }
}

impl StorageConfig {
    /// 状态文件路径，`~/` 展开为用户家目录
    pub fn state_path(&self) -> PathBuf {
        if let Some(rest) = self.state_file.strip_prefix("~/") {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home.join(rest)
        } else {
            PathBuf::from(&self.state_file)
        }
    }
}

impl Config {
    /// 加载配置，支持从指定路径或默认路径加载
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let pkg_name = env!("CARGO_PKG_NAME");
        let config_path = path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|p| p.join(pkg_name).join("config.toml"))
                .unwrap_or_else(|| PathBuf::from(format!("{}-config.toml", pkg_name)))
        });

        debug!("尝试从 {:?} 加载配置文件", config_path);

        let mut config = if !config_path.exists() {
            debug!("配置文件 {:?} 不存在，将创建默认配置", config_path);
            let default_config = Config::default();
            let toml = toml::to_string_pretty(&default_config)?;

            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
                debug!("已确保目录 {:?} 存在", parent);
            }

            fs::write(&config_path, toml)?;
            info!("已创建默认配置文件: {:?}", config_path);
            default_config
        } else {
            let content = fs::read_to_string(&config_path)?;
            match toml::from_str(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!("解析配置文件 {:?} 失败: {}", config_path, e);
                    warn!("由于解析错误，将加载默认配置");
                    Config::default()
                }
            }
        };

        config.apply_env();
        debug!("已成功加载配置文件");
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = env::var(API_KEY_ENV) {
            if !key.is_empty() {
                debug!("使用环境变量 {} 中的 API Key", API_KEY_ENV);
                self.api.api_key = Some(key);
            }
        }
    }
}
