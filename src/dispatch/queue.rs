use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::config::DispatchConfig;
use crate::notifications::NotificationRecord;

#[derive(Debug, Clone)]
pub struct DispatchQueueConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for DispatchQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl From<&DispatchConfig> for DispatchQueueConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            base_backoff: config.base_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

/// A claimed unit of work. The worker holding it is the record's only writer.
#[derive(Debug)]
pub struct QueueItem {
    pub record: NotificationRecord,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueueItem>,
}

#[derive(Debug, Default, Clone)]
pub struct DispatchQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    config: DispatchQueueConfig,
}

impl DispatchQueue {
    pub fn new(config: DispatchQueueConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            config,
        }
    }

    pub async fn enqueue(&self, record: NotificationRecord) {
        let mut state = self.state.lock().await;
        state.pending.push_back(QueueItem { record });
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> QueueItem {
        loop {
            if let Some(item) = {
                let mut guard = self.state.lock().await;
                guard.pending.pop_front()
            } {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Puts the item back after the backoff for its attempt count.
    pub fn retry(&self, item: QueueItem) {
        let backoff = compute_backoff(item.record.attempts, &self.config);
        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let mut guard = state.lock().await;
            guard.pending.push_back(item);
            notify.notify_one();
        });
    }

    pub fn config(&self) -> &DispatchQueueConfig {
        &self.config
    }
}

pub fn compute_backoff(attempt: usize, config: &DispatchQueueConfig) -> Duration {
    let exp = attempt.saturating_sub(1) as u32;
    let multiplier = 1u64.checked_shl(exp.min(10)).unwrap_or(u64::MAX);
    let base = config.base_backoff.as_millis() as u64;
    let backoff = base.saturating_mul(multiplier);
    let max = config.max_backoff.as_millis() as u64;
    Duration::from_millis(std::cmp::min(backoff, max))
}
