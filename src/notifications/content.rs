use serde::Serialize;
use serde_json::{Map, Value};

use crate::notifications::record::Channel;

pub const DEFAULT_TITLE: &str = "Notification";
pub const DEFAULT_BOT_NAME: &str = "Notification Bot";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("missing required field '{field}' for {channel} notification")]
    MissingField { channel: Channel, field: &'static str },
    #[error("field '{field}' for {channel} notification must be {expected}")]
    InvalidField {
        channel: Channel,
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsContent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushContent {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatContent {
    pub message: String,
    /// Left unset so the provider can apply its configured bot name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Channel payload with defaults already applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelContent {
    Email(EmailContent),
    Sms(SmsContent),
    Push(PushContent),
    Chat(ChatContent),
}

impl ChannelContent {
    /// Reads the subset of `fields` the channel understands.
    pub fn project(channel: Channel, fields: &Map<String, Value>) -> Result<Self, ContentError> {
        match channel {
            Channel::Email => Ok(Self::Email(EmailContent {
                subject: optional_text(channel, fields, "subject")?
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                body: required_text(channel, fields, "body", &["body", "message"])?,
                html_body: optional_text(channel, fields, "html_body")?,
            })),
            Channel::Sms => Ok(Self::Sms(SmsContent {
                message: required_text(channel, fields, "message", &["message", "body"])?,
            })),
            Channel::Push => Ok(Self::Push(PushContent {
                title: optional_text(channel, fields, "title")?
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                body: required_text(channel, fields, "body", &["body", "message"])?,
                data: optional_object(channel, fields, "data")?,
            })),
            Channel::Chat => Ok(Self::Chat(ChatContent {
                message: required_text(channel, fields, "message", &["message", "body"])?,
                username: optional_text(channel, fields, "username")?,
            })),
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::Email(_) => Channel::Email,
            Self::Sms(_) => Channel::Sms,
            Self::Push(_) => Channel::Push,
            Self::Chat(_) => Channel::Chat,
        }
    }

    /// The resolved fields, defaults included, as an open mapping.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn required_text(
    channel: Channel,
    fields: &Map<String, Value>,
    field: &'static str,
    keys: &[&str],
) -> Result<String, ContentError> {
    for key in keys {
        match fields.get(*key) {
            Some(Value::String(text)) if !text.trim().is_empty() => return Ok(text.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => continue,
            Some(_) => {
                return Err(ContentError::InvalidField {
                    channel,
                    field,
                    expected: "a string",
                });
            }
        }
    }
    Err(ContentError::MissingField { channel, field })
}

fn optional_text(
    channel: Channel,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ContentError> {
    match fields.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(Some(text.clone())),
        Some(Value::String(_)) | Some(Value::Null) | None => Ok(None),
        Some(_) => Err(ContentError::InvalidField {
            channel,
            field,
            expected: "a string",
        }),
    }
}

fn optional_object(
    channel: Channel,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Map<String, Value>>, ContentError> {
    match fields.get(field) {
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(ContentError::InvalidField {
            channel,
            field,
            expected: "an object",
        }),
    }
}
