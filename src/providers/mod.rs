//! Delivery providers, one per channel.
//!
//! A provider never lets a fault escape `attempt`: transport errors,
//! timeouts, rejected or malformed responses and panics all come back as a
//! failed [`ProviderResult`].

pub mod chat;
pub mod email;
pub mod error;
pub mod push;
pub mod registry;
pub mod simulated;
pub mod sms;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;

use crate::notifications::{Channel, ChannelContent};

pub use chat::ChatProvider;
pub use email::EmailProvider;
pub use error::ProviderError;
pub use push::PushProvider;
pub use registry::{ProviderRegistry, RegistryError};
pub use simulated::SimulatedProvider;
pub use sms::SmsProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub success: bool,
    pub detail: Option<String>,
    /// Hint for the worker pool; only meaningful when `success` is false.
    pub retryable: bool,
}

impl ProviderResult {
    pub fn delivered() -> Self {
        Self {
            success: true,
            detail: None,
            retryable: false,
        }
    }

    pub fn failed(detail: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
            retryable,
        }
    }

    pub fn from_error(err: &ProviderError) -> Self {
        Self::failed(err.to_string(), err.is_retryable())
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn channel(&self) -> Channel;
    async fn attempt(&self, recipient: &str, content: &ChannelContent) -> ProviderResult;
}

/// Runs one delivery under `timeout`, converting errors, elapsed timers and
/// panics into a failed result.
pub async fn contain<F>(
    channel: Channel,
    recipient: &str,
    timeout: Duration,
    delivery: F,
) -> ProviderResult
where
    F: Future<Output = Result<(), ProviderError>> + Send,
{
    let guarded = AssertUnwindSafe(tokio::time::timeout(timeout, delivery)).catch_unwind();
    let err = match guarded.await {
        Ok(Ok(Ok(()))) => {
            tracing::debug!(
                event = "provider_delivered",
                channel = %channel,
                recipient = %redact(recipient),
                "provider accepted notification"
            );
            return ProviderResult::delivered();
        }
        Ok(Ok(Err(err))) => err,
        Ok(Err(_elapsed)) => ProviderError::Timeout(timeout),
        Err(panic) => ProviderError::Panicked(panic_message(panic.as_ref())),
    };
    tracing::warn!(
        event = "provider_failed",
        channel = %channel,
        recipient = %redact(recipient),
        retryable = err.is_retryable(),
        error = %err,
        "provider failed to deliver notification"
    );
    ProviderResult::from_error(&err)
}

pub(crate) fn mismatched_content(expected: Channel, content: &ChannelContent) -> ProviderResult {
    ProviderResult::failed(
        format!(
            "{expected} provider cannot deliver {} content",
            content.channel()
        ),
        false,
    )
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = panic.downcast_ref::<String>() {
        return text.clone();
    }
    "unknown panic".to_string()
}

/// Keeps device tokens and addresses out of logs in full.
pub(crate) fn redact(recipient: &str) -> String {
    let visible: String = recipient.chars().take(10).collect();
    if visible.len() < recipient.len() {
        format!("{visible}...")
    } else {
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn contain_converts_errors() {
        let result = contain(Channel::Sms, "+1555", Duration::from_secs(1), async {
            Err(ProviderError::Transport("connection reset".to_string()))
        })
        .await;
        assert!(!result.success);
        assert!(result.retryable);
        assert!(result.detail.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn contain_catches_panics() {
        let explode = true;
        let result = contain(Channel::Push, "token", Duration::from_secs(1), async move {
            if explode {
                panic!("gateway exploded");
            }
            Ok(())
        })
        .await;
        assert!(!result.success);
        assert!(!result.retryable);
        assert!(result.detail.unwrap().contains("gateway exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn contain_enforces_timeout() {
        let result = contain(Channel::Chat, "#ops", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(!result.success);
        assert!(result.retryable);
        assert!(result.detail.unwrap().contains("timed out"));
    }

    #[test]
    fn redact_truncates_long_recipients() {
        assert_eq!(redact("short"), "short");
        assert_eq!(redact("abcdefghijklmnop"), "abcdefghij...");
    }
}
