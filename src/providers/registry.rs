use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::notifications::Channel;
use crate::providers::{
    ChatProvider, EmailProvider, Provider, ProviderError, PushProvider, SimulatedProvider,
    SmsProvider,
};

pub const DEFAULT_SMTP_PASSWORD_ENV: &str = "SMTP_PASSWORD";
pub const DEFAULT_SMS_TOKEN_ENV: &str = "SMS_AUTH_TOKEN";
pub const DEFAULT_PUSH_KEY_ENV: &str = "PUSH_SERVER_KEY";

/// Channel name to long-lived provider instance.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<Channel, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Every channel backed by a zero-latency simulated provider.
    pub fn simulated() -> Self {
        let mut registry = Self::new();
        for channel in Channel::ALL {
            registry
                .providers
                .insert(channel, Arc::new(SimulatedProvider::new(channel)));
        }
        registry
    }

    pub fn from_config(config: &ProvidersConfig) -> Result<Self, RegistryError> {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Builds one provider per channel. Channels without a config section
    /// get a simulated provider.
    pub fn from_config_with_env<F>(config: &ProvidersConfig, env: F) -> Result<Self, RegistryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = Self::new();

        let email: Arc<dyn Provider> = match &config.email {
            Some(cfg) => {
                let password = match (&cfg.username, &cfg.password_env) {
                    (Some(_), Some(key)) => Some(require_env(&env, Channel::Email, key)?),
                    (Some(_), None) => {
                        Some(require_env(&env, Channel::Email, DEFAULT_SMTP_PASSWORD_ENV)?)
                    }
                    (None, _) => None,
                };
                Arc::new(EmailProvider::new(cfg, password).map_err(init_error(Channel::Email))?)
            }
            None => Arc::new(SimulatedProvider::with_default_latency(Channel::Email)),
        };
        registry.register(email)?;

        let sms: Arc<dyn Provider> = match &config.sms {
            Some(cfg) => {
                let key = cfg.auth_token_env.as_deref().unwrap_or(DEFAULT_SMS_TOKEN_ENV);
                let token = require_env(&env, Channel::Sms, key)?;
                Arc::new(SmsProvider::new(cfg, token).map_err(init_error(Channel::Sms))?)
            }
            None => Arc::new(SimulatedProvider::with_default_latency(Channel::Sms)),
        };
        registry.register(sms)?;

        let push: Arc<dyn Provider> = match &config.push {
            Some(cfg) => {
                let key = cfg.server_key_env.as_deref().unwrap_or(DEFAULT_PUSH_KEY_ENV);
                let server_key = require_env(&env, Channel::Push, key)?;
                Arc::new(PushProvider::new(cfg, server_key).map_err(init_error(Channel::Push))?)
            }
            None => Arc::new(SimulatedProvider::with_default_latency(Channel::Push)),
        };
        registry.register(push)?;

        let chat: Arc<dyn Provider> = match &config.chat {
            Some(cfg) => Arc::new(ChatProvider::new(cfg).map_err(init_error(Channel::Chat))?),
            None => Arc::new(SimulatedProvider::with_default_latency(Channel::Chat)),
        };
        registry.register(chat)?;

        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<(), RegistryError> {
        let channel = provider.channel();
        if self.providers.contains_key(&channel) {
            return Err(RegistryError::DuplicateProvider(channel));
        }
        self.providers.insert(channel, provider);
        Ok(())
    }

    /// Replaces whatever provider serves the same channel.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.channel(), provider);
        self
    }

    pub fn resolve(&self, channel: &str) -> Result<Arc<dyn Provider>, RegistryError> {
        Channel::parse(channel)
            .and_then(|parsed| self.providers.get(&parsed).cloned())
            .ok_or_else(|| RegistryError::UnknownChannel(channel.to_string()))
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.providers.keys().copied().collect();
        channels.sort_by_key(|channel| channel.as_str());
        channels
    }
}

fn require_env<F>(env: &F, channel: Channel, key: &str) -> Result<String, RegistryError>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RegistryError::ProviderInit {
            channel,
            detail: format!("missing credential in env '{key}'"),
        })
}

fn init_error(channel: Channel) -> impl Fn(ProviderError) -> RegistryError {
    move |err| RegistryError::ProviderInit {
        channel,
        detail: err.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider for channel '{0}' already registered")]
    DuplicateProvider(Channel),
    #[error("unknown notification type")]
    UnknownChannel(String),
    #[error("Failed to initialize {channel} provider: {detail}")]
    ProviderInit { channel: Channel, detail: String },
}
