use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Bucket for callers that present no API key.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

#[derive(Debug)]
struct Window {
    opened: Instant,
    spent: u32,
}

/// The caller must wait `retry_after` before its window reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttled {
    pub retry_after: Duration,
}

/// Per-client submission quota over a fixed window. Each notification costs
/// one unit, so a bulk request spends one unit per item and a batch larger
/// than the quota is never admitted.
#[derive(Debug, Clone)]
pub struct SubmissionLimiter {
    windows: Arc<DashMap<String, Window>>,
    quota: u32,
    window: Duration,
}

impl SubmissionLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            quota: quota.max(1),
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .notifications_per_minute
            .map(|quota| Self::new(quota, Duration::from_secs(60)))
    }

    pub fn acquire(&self, client: &str, cost: u32) -> Result<(), Throttled> {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry(client.to_string())
            .or_insert_with(|| Window {
                opened: now,
                spent: 0,
            });
        let elapsed = now.duration_since(window.opened);
        if elapsed >= self.window {
            window.opened = now;
            window.spent = 0;
        }
        let cost = cost.max(1);
        if window.spent.saturating_add(cost) > self.quota {
            return Err(Throttled {
                retry_after: self
                    .window
                    .saturating_sub(now.duration_since(window.opened)),
            });
        }
        window.spent += cost;
        Ok(())
    }
}
