use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::{ChatProviderConfig, provider_timeout};
use crate::notifications::content::{ChatContent, DEFAULT_BOT_NAME};
use crate::notifications::{Channel, ChannelContent};
use crate::providers::{Provider, ProviderError, ProviderResult, contain, mismatched_content};

/// Incoming-webhook chat delivery (Slack-compatible payload).
pub struct ChatProvider {
    client: Client,
    webhook_url: url::Url,
    default_username: String,
    timeout: Duration,
}

impl ChatProvider {
    pub fn new(config: &ChatProviderConfig) -> Result<Self, ProviderError> {
        let timeout = provider_timeout(config.timeout_secs);
        let webhook_url = url::Url::parse(&config.webhook_url)
            .map_err(|err| ProviderError::Config(format!("invalid chat webhook url: {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            webhook_url,
            default_username: config
                .default_username
                .clone()
                .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            timeout,
        })
    }

    async fn deliver(
        &self,
        channel_name: &str,
        content: &ChatContent,
    ) -> Result<(), ProviderError> {
        let username = content
            .username
            .as_deref()
            .unwrap_or(&self.default_username);
        let payload = json!({
            "channel": channel_name,
            "text": content.message,
            "username": username,
        });
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(err, self.timeout))?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for ChatProvider {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    async fn attempt(&self, recipient: &str, content: &ChannelContent) -> ProviderResult {
        let ChannelContent::Chat(chat) = content else {
            return mismatched_content(Channel::Chat, content);
        };
        contain(Channel::Chat, recipient, self.timeout, self.deliver(recipient, chat)).await
    }
}
