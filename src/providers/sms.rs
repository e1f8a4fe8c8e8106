use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{SmsProviderConfig, provider_timeout};
use crate::notifications::content::SmsContent;
use crate::notifications::{Channel, ChannelContent};
use crate::providers::{Provider, ProviderError, ProviderResult, contain, mismatched_content};

pub const DEFAULT_SMS_ENDPOINT: &str =
    "https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Messages.json";

/// Twilio-style Messages API: form POST with basic auth.
pub struct SmsProvider {
    client: Client,
    endpoint: url::Url,
    account_sid: String,
    auth_token: String,
    from_number: String,
    timeout: Duration,
}

impl SmsProvider {
    pub fn new(config: &SmsProviderConfig, auth_token: String) -> Result<Self, ProviderError> {
        let timeout = provider_timeout(config.timeout_secs);
        let endpoint = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_SMS_ENDPOINT)
            .replace("{account_sid}", &config.account_sid);
        let endpoint = url::Url::parse(&endpoint).map_err(|err| {
            ProviderError::Config(format!("invalid sms endpoint '{endpoint}': {err}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            account_sid: config.account_sid.clone(),
            auth_token,
            from_number: config.from_number.clone(),
            timeout,
        })
    }

    async fn deliver(&self, recipient: &str, content: &SmsContent) -> Result<(), ProviderError> {
        if recipient.trim().is_empty() {
            return Err(ProviderError::InvalidRecipient(recipient.to_string()));
        }
        let form = [
            ("From", self.from_number.as_str()),
            ("To", recipient),
            ("Body", content.message.as_str()),
        ];
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
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
impl Provider for SmsProvider {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn attempt(&self, recipient: &str, content: &ChannelContent) -> ProviderResult {
        let ChannelContent::Sms(sms) = content else {
            return mismatched_content(Channel::Sms, content);
        };
        contain(Channel::Sms, recipient, self.timeout, self.deliver(recipient, sms)).await
    }
}
