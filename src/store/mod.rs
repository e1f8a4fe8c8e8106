//! Persistence boundary: a key-value store with expiring entries.

pub mod error;
pub mod memory;
pub mod records;
#[cfg(feature = "redis")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use records::RecordStore;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Writes `value` under `key`, replacing any previous value. The entry
    /// is gone once `ttl` elapses.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
}

/// Builds the configured backend.
pub async fn open_store(config: &crate::config::StoreConfig) -> StoreResult<Arc<dyn StateStore>> {
    match config.backend() {
        crate::config::StoreBackend::Memory => {
            let store = MemoryStore::new();
            let _sweeper = store.spawn_sweeper(config.sweep_interval());
            Ok(Arc::new(store))
        }
        #[cfg(feature = "redis")]
        crate::config::StoreBackend::Redis => {
            let url = config.redis_url.as_deref().unwrap_or("redis://127.0.0.1:6379");
            let store = redis::RedisStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        crate::config::StoreBackend::Redis => Err(StoreError::Unavailable(
            "redis backend requires the 'redis' feature".to_string(),
        )),
    }
}
