use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{EmailProviderConfig, provider_timeout};
use crate::notifications::content::EmailContent;
use crate::notifications::{Channel, ChannelContent};
use crate::providers::{Provider, ProviderError, ProviderResult, contain, mismatched_content};

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP delivery through an async lettre transport.
pub struct EmailProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl EmailProvider {
    pub fn new(
        config: &EmailProviderConfig,
        password: Option<String>,
    ) -> Result<Self, ProviderError> {
        let timeout = provider_timeout(config.timeout_secs);
        let mut builder = if config.use_tls.unwrap_or(true) {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host).map_err(
                |err| ProviderError::Config(format!("SMTP relay configuration error: {err}")),
            )?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.smtp_host.as_str())
        };
        builder = builder
            .port(config.smtp_port.unwrap_or(DEFAULT_SMTP_PORT))
            .timeout(Some(timeout));
        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.unwrap_or_default(),
            ));
        }

        let address = config
            .from_address
            .parse::<Address>()
            .map_err(|err| ProviderError::Config(format!("invalid from address: {err}")))?;
        let from = Mailbox::new(config.from_name.clone(), address);

        Ok(Self {
            transport: builder.build(),
            from,
            timeout,
        })
    }

    pub fn build_message(
        &self,
        recipient: &str,
        content: &EmailContent,
    ) -> Result<Message, ProviderError> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|_| ProviderError::InvalidRecipient(recipient.to_string()))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.subject.clone());
        let message = match &content.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                content.body.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(content.body.clone()),
        };
        message.map_err(|err| ProviderError::InvalidContent(err.to_string()))
    }

    async fn deliver(&self, recipient: &str, content: &EmailContent) -> Result<(), ProviderError> {
        let message = self.build_message(recipient, content)?;
        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_permanent() => Err(ProviderError::Refused(err.to_string())),
            Err(err) if err.is_timeout() => Err(ProviderError::Timeout(self.timeout)),
            Err(err) => Err(ProviderError::Transport(err.to_string())),
        }
    }
}

#[async_trait]
impl Provider for EmailProvider {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn attempt(&self, recipient: &str, content: &ChannelContent) -> ProviderResult {
        let ChannelContent::Email(email) = content else {
            return mismatched_content(Channel::Email, content);
        };
        contain(
            Channel::Email,
            recipient,
            self.timeout,
            self.deliver(recipient, email),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> EmailProviderConfig {
        EmailProviderConfig {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: Some(port),
            username: None,
            password_env: None,
            from_address: "noreply@example.com".to_string(),
            from_name: Some("Alerts".to_string()),
            use_tls: Some(false),
            timeout_secs: Some(2),
        }
    }

    fn content(html: Option<&str>) -> EmailContent {
        EmailContent {
            subject: "Notification".to_string(),
            body: "hi".to_string(),
            html_body: html.map(str::to_string),
        }
    }

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    }

    #[tokio::test]
    async fn rejects_invalid_from_address() {
        let mut cfg = config(25);
        cfg.from_address = "not an address".to_string();
        assert!(matches!(
            EmailProvider::new(&cfg, None),
            Err(ProviderError::Config(_))
        ));
    }

    #[tokio::test]
    async fn builds_plain_and_multipart_messages() {
        let provider = EmailProvider::new(&config(25), None).unwrap();
        let plain = provider.build_message("a@b.com", &content(None)).unwrap();
        let raw = String::from_utf8(plain.formatted()).unwrap();
        assert!(raw.contains("Subject: Notification"));
        assert!(raw.contains("From: Alerts <noreply@example.com>"));
        assert!(!raw.contains("multipart/alternative"));

        let rich = provider
            .build_message("a@b.com", &content(Some("<b>hi</b>")))
            .unwrap();
        let raw = String::from_utf8(rich.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn invalid_recipient_fails_without_sending() {
        let provider = EmailProvider::new(&config(25), None).unwrap();
        let result = provider
            .attempt("not-an-email", &ChannelContent::Email(content(None)))
            .await;
        assert!(!result.success);
        assert!(!result.retryable);
        assert!(result.detail.unwrap().contains("invalid recipient"));
    }

    #[tokio::test]
    async fn unreachable_server_is_contained() {
        let provider = EmailProvider::new(&config(unused_port()), None).unwrap();
        let result = provider
            .attempt("a@b.com", &ChannelContent::Email(content(None)))
            .await;
        assert!(!result.success);
        assert!(!result.detail.unwrap_or_default().is_empty());
    }
}
