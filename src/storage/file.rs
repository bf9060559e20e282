use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{PlayerError, Result};
use crate::storage::PersistenceAdapter;

/// 单个 JSON 文件保存所有键
pub struct JsonFileStorage {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStorage {
    /// 打开状态文件，不存在或损坏时从空状态开始
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(values) => {
                    debug!("已加载状态文件 {:?}, {}项", path, values.len());
                    values
                }
                Err(e) => {
                    warn!("状态文件 {:?} 已损坏，从空状态开始: {}", path, e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("状态文件 {:?} 不存在，将在首次写入时创建", path);
                Map::new()
            }
            Err(e) => {
                warn!("读取状态文件 {:?} 失败: {}", path, e);
                Map::new()
            }
        };

        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| PlayerError::StorageUnavailable(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PersistenceAdapter for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
