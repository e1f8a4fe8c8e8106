use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::{PushProviderConfig, provider_timeout};
use crate::notifications::content::PushContent;
use crate::notifications::{Channel, ChannelContent};
use crate::providers::{Provider, ProviderError, ProviderResult, contain, mismatched_content};

pub const DEFAULT_PUSH_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    success: u64,
}

/// FCM-style push gateway.
pub struct PushProvider {
    client: Client,
    endpoint: url::Url,
    server_key: String,
    timeout: Duration,
}

impl PushProvider {
    pub fn new(config: &PushProviderConfig, server_key: String) -> Result<Self, ProviderError> {
        let timeout = provider_timeout(config.timeout_secs);
        let raw = config.endpoint.as_deref().unwrap_or(DEFAULT_PUSH_ENDPOINT);
        let endpoint = url::Url::parse(raw)
            .map_err(|err| ProviderError::Config(format!("invalid push endpoint '{raw}': {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            server_key,
            timeout,
        })
    }

    pub fn build_payload(device_token: &str, content: &PushContent) -> serde_json::Value {
        let mut payload = json!({
            "to": device_token,
            "notification": {
                "title": content.title,
                "body": content.body,
                "sound": "default"
            }
        });
        if let Some(data) = &content.data {
            payload["data"] = serde_json::Value::Object(data.clone());
        }
        payload
    }

    async fn deliver(
        &self,
        device_token: &str,
        content: &PushContent,
    ) -> Result<(), ProviderError> {
        if device_token.trim().is_empty() {
            return Err(ProviderError::InvalidRecipient(device_token.to_string()));
        }
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("key={}", self.server_key),
            )
            .json(&Self::build_payload(device_token, content))
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(err, self.timeout))?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::from_reqwest(err, self.timeout))?;
        let parsed: GatewayResponse = serde_json::from_str(&body)
            .map_err(|err| ProviderError::MalformedResponse(format!("{err}: {body}")))?;
        if parsed.success == 0 {
            return Err(ProviderError::Refused(format!(
                "push gateway reported no successful deliveries: {body}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for PushProvider {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn attempt(&self, recipient: &str, content: &ChannelContent) -> ProviderResult {
        let ChannelContent::Push(push) = content else {
            return mismatched_content(Channel::Push, content);
        };
        contain(Channel::Push, recipient, self.timeout, self.deliver(recipient, push)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_includes_data_only_when_present() {
        let mut content = PushContent {
            title: "Notification".to_string(),
            body: "b".to_string(),
            data: None,
        };
        let payload = PushProvider::build_payload("tok", &content);
        assert_eq!(payload["notification"]["sound"], "default");
        assert!(payload.get("data").is_none());

        let mut data = serde_json::Map::new();
        data.insert("order".to_string(), json!(42));
        content.data = Some(data);
        let payload = PushProvider::build_payload("tok", &content);
        assert_eq!(payload["data"]["order"], 42);
        assert_eq!(payload["to"], "tok");
    }
}
