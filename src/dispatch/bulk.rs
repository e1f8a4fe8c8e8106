use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch::engine::DispatchEngine;
use crate::notifications::{NotificationRequest, NotificationStatus, Priority};

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem {
    #[serde(alias = "type")]
    pub channel: String,
    pub recipient: String,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl BulkItem {
    pub fn new(
        channel: impl Into<String>,
        recipient: impl Into<String>,
        content: Map<String, Value>,
    ) -> Self {
        Self {
            channel: channel.into(),
            recipient: recipient.into(),
            content,
            user_id: None,
            priority: Priority::Normal,
        }
    }

    fn into_request(self) -> NotificationRequest {
        let user_id = self.user_id.unwrap_or_else(|| self.recipient.clone());
        NotificationRequest::new(user_id, self.channel, self.recipient, self.content)
            .with_priority(self.priority)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub success: usize,
    pub failed: usize,
}

/// Fans a batch out concurrently; each item still gets its own record.
#[derive(Clone)]
pub struct BulkCoordinator {
    engine: DispatchEngine,
}

impl BulkCoordinator {
    pub fn new(engine: DispatchEngine) -> Self {
        Self { engine }
    }

    pub async fn send_bulk(&self, items: Vec<BulkItem>) -> BulkSummary {
        let total = items.len();
        let handles = items
            .into_iter()
            .map(|item| {
                let engine = self.engine.clone();
                tokio::spawn(async move { engine.dispatch_now(item.into_request()).await })
            })
            .collect::<Vec<_>>();

        let mut summary = BulkSummary::default();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Ok(record)) if record.status == NotificationStatus::Sent => summary.success += 1,
                Ok(Ok(_)) => summary.failed += 1,
                Ok(Err(err)) => {
                    tracing::warn!(
                        event = "bulk_item_error",
                        error = %err,
                        "bulk item could not be dispatched"
                    );
                    summary.failed += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        event = "bulk_item_aborted",
                        error = %err,
                        "bulk item task did not complete"
                    );
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            event = "bulk_dispatch",
            total,
            success = summary.success,
            failed = summary.failed,
            "bulk dispatch finished"
        );
        summary
    }
}
