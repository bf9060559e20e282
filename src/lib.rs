// 播放核心库

// 模块导出
pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod player;
pub mod storage;
pub mod utils;

pub use error::{PlayerError, Result};
