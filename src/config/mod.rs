mod loader;

pub use loader::{ApiConfig, Config, PlayerConfig, StorageConfig, API_KEY_ENV};
