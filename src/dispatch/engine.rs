use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::dispatch::error::DispatchResult;
use crate::dispatch::queue::{DispatchQueue, DispatchQueueConfig, compute_backoff};
use crate::notifications::{
    Channel, ChannelContent, NotificationRecord, NotificationRequest, NotificationStatus,
};
use crate::providers::{ProviderRegistry, panic_message};
use crate::store::{RecordStore, StateStore};

pub const UNKNOWN_CHANNEL_ERROR: &str = "unknown notification type";
pub const PROVIDER_FAILED_ERROR: &str = "Provider failed to send notification";

/// What the accept path hands back before any delivery happens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepted {
    pub id: String,
    pub status: NotificationStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug)]
enum Outcome {
    Delivered,
    Failed { reason: String, retryable: bool },
}

/// Owns the queued -> sent | failed lifecycle.
#[derive(Clone)]
pub struct DispatchEngine {
    registry: Arc<ProviderRegistry>,
    records: RecordStore,
    queue: DispatchQueue,
    workers: usize,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        records: RecordStore,
        queue: DispatchQueue,
    ) -> Self {
        Self {
            registry,
            records,
            queue,
            workers: 1,
        }
    }

    pub fn from_config(
        config: &Config,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let dispatch = config.dispatch();
        let records = RecordStore::new(store, config.store().retention());
        let queue = DispatchQueue::new(DispatchQueueConfig::from(&dispatch));
        Self::new(registry, records, queue).with_workers(dispatch.workers())
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Persists a queued record and schedules it. The record is readable by
    /// the time this returns.
    pub async fn accept(&self, request: NotificationRequest) -> DispatchResult<Accepted> {
        let record = NotificationRecord::queued(request);
        self.records.save(&record).await?;
        tracing::info!(
            event = "notification_queued",
            notification_id = %record.id,
            channel = %record.channel,
            user_id = %record.user_id,
            priority = ?record.priority,
            "notification accepted"
        );
        let accepted = Accepted {
            id: record.id.clone(),
            status: record.status,
            timestamp: record.timestamp,
        };
        self.queue.enqueue(record).await;
        Ok(accepted)
    }

    pub async fn get(&self, id: &str) -> DispatchResult<Option<NotificationRecord>> {
        Ok(self.records.load(id).await?)
    }

    /// Accepts and processes inline, skipping the queue.
    pub async fn dispatch_now(
        &self,
        request: NotificationRequest,
    ) -> DispatchResult<NotificationRecord> {
        let record = NotificationRecord::queued(request);
        self.records.save(&record).await?;
        self.process(record).await
    }

    /// Runs a record to a terminal state, retrying in place with backoff.
    /// Terminal records come back untouched.
    pub async fn process(
        &self,
        mut record: NotificationRecord,
    ) -> DispatchResult<NotificationRecord> {
        if record.is_terminal() {
            return Ok(record);
        }
        let config = self.queue.config();
        loop {
            let outcome = self.attempt_once(&mut record).await;
            if let Outcome::Failed {
                retryable: true, ..
            } = &outcome
                && record.attempts < config.max_attempts
            {
                tokio::time::sleep(compute_backoff(record.attempts, config)).await;
                continue;
            }
            return self.finish(record, outcome).await;
        }
    }

    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|worker| {
                let engine = self.clone();
                tokio::spawn(async move { engine.worker_loop(worker).await })
            })
            .collect()
    }

    pub async fn worker_loop(&self, worker: usize) {
        loop {
            let mut item = self.queue.pop().await;
            if item.record.is_terminal() {
                continue;
            }
            let outcome = self.attempt_once(&mut item.record).await;
            if let Outcome::Failed {
                retryable: true,
                reason,
            } = &outcome
                && item.record.attempts < self.queue.config().max_attempts
            {
                tracing::debug!(
                    event = "notification_retry",
                    worker,
                    notification_id = %item.record.id,
                    channel = %item.record.channel,
                    attempts = item.record.attempts,
                    error = %reason,
                    "notification scheduled for retry"
                );
                self.queue.retry(item);
                continue;
            }
            let id = item.record.id.clone();
            if let Err(err) = self.finish(item.record, outcome).await {
                tracing::error!(
                    event = "notification_persist_failed",
                    worker,
                    notification_id = %id,
                    error = %err,
                    "terminal status could not be stored"
                );
            }
        }
    }

    async fn attempt_once(&self, record: &mut NotificationRecord) -> Outcome {
        let Some(channel) = Channel::parse(&record.channel) else {
            return unknown_channel();
        };
        let content = match ChannelContent::project(channel, &record.content) {
            Ok(content) => content,
            Err(err) => {
                return Outcome::Failed {
                    reason: err.to_string(),
                    retryable: false,
                };
            }
        };
        record.content.extend(content.to_fields());

        let Ok(provider) = self.registry.resolve(&record.channel) else {
            return unknown_channel();
        };
        record.attempts += 1;
        let attempt = AssertUnwindSafe(provider.attempt(&record.recipient, &content))
            .catch_unwind()
            .await;
        match attempt {
            Ok(result) if result.success => Outcome::Delivered,
            Ok(result) => Outcome::Failed {
                reason: result
                    .detail
                    .filter(|detail| !detail.trim().is_empty())
                    .unwrap_or_else(|| PROVIDER_FAILED_ERROR.to_string()),
                retryable: result.retryable,
            },
            Err(panic) => Outcome::Failed {
                reason: format!("provider panicked: {}", panic_message(panic.as_ref())),
                retryable: false,
            },
        }
    }

    async fn finish(
        &self,
        mut record: NotificationRecord,
        outcome: Outcome,
    ) -> DispatchResult<NotificationRecord> {
        let transition = match &outcome {
            Outcome::Delivered => record.mark_sent(),
            Outcome::Failed { reason, .. } => record.mark_failed(reason.clone()),
        };
        if let Err(err) = transition {
            tracing::warn!(
                event = "notification_transition_rejected",
                notification_id = %record.id,
                error = %err,
                "record already terminal"
            );
            return Ok(record);
        }
        match record.status {
            NotificationStatus::Sent => tracing::info!(
                event = "notification_status",
                notification_id = %record.id,
                channel = %record.channel,
                status = ?record.status,
                attempts = record.attempts,
                priority = ?record.priority,
                "notification sent"
            ),
            _ => tracing::warn!(
                event = "notification_failed",
                notification_id = %record.id,
                channel = %record.channel,
                status = ?record.status,
                attempts = record.attempts,
                error = record.error.as_deref().unwrap_or_default(),
                "notification delivery failed"
            ),
        }
        self.records.save(&record).await?;
        Ok(record)
    }
}

fn unknown_channel() -> Outcome {
    Outcome::Failed {
        reason: UNKNOWN_CHANNEL_ERROR.to_string(),
        retryable: false,
    }
}
