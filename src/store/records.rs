use std::sync::Arc;
use std::time::Duration;

use crate::notifications::NotificationRecord;
use crate::store::{StateStore, StoreError, StoreResult};

pub const KEY_PREFIX: &str = "notification:";
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Typed view over the store for notification records.
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn StateStore>,
    retention: Duration,
}

impl RecordStore {
    pub fn new(store: Arc<dyn StateStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn save(&self, record: &NotificationRecord) -> StoreResult<()> {
        let value =
            serde_json::to_string(record).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.store
            .put(&record_key(&record.id), value, self.retention)
            .await
    }

    pub async fn load(&self, id: &str) -> StoreResult<Option<NotificationRecord>> {
        let Some(raw) = self.store.get(&record_key(id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StoreError::Corrupt(format!("record {id}: {err}")))
    }
}

pub fn record_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}
