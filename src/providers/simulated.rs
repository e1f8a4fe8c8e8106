use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DEFAULT_PROVIDER_TIMEOUT_SECS;
use crate::notifications::{Channel, ChannelContent};
use crate::providers::{Provider, ProviderError, ProviderResult, contain, mismatched_content};

/// Stand-in for a channel with no configured gateway.
#[derive(Debug)]
pub struct SimulatedProvider {
    channel: Channel,
    latency: Duration,
    timeout: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl SimulatedProvider {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            latency: Duration::ZERO,
            timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Latencies mirroring typical gateway round trips per channel.
    pub fn with_default_latency(channel: Channel) -> Self {
        let latency = match channel {
            Channel::Email => Duration::from_secs(1),
            Channel::Sms => Duration::from_millis(500),
            Channel::Push | Channel::Chat => Duration::from_millis(100),
        };
        Self::new(channel).with_latency(latency)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every attempt fails with a transport error carrying `detail`.
    pub fn failing(mut self, detail: impl Into<String>) -> Self {
        self.failure = Some(detail.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn attempt(&self, recipient: &str, content: &ChannelContent) -> ProviderResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if content.channel() != self.channel {
            return mismatched_content(self.channel, content);
        }
        let latency = self.latency;
        let failure = self.failure.clone();
        let channel = self.channel;
        contain(self.channel, recipient, self.timeout, async move {
            tokio::time::sleep(latency).await;
            if let Some(detail) = failure {
                return Err(ProviderError::Transport(detail));
            }
            tracing::info!(
                event = "simulated_delivery",
                channel = %channel,
                "simulated provider delivered notification"
            );
            Ok(())
        })
        .await
    }
}
