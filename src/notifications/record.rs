use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields owned by the record itself. Content keys with these names are
/// dropped so the flat serialized form stays unambiguous.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "user_id",
    "channel",
    "type",
    "recipient",
    "priority",
    "status",
    "error",
    "attempts",
    "timestamp",
    "content",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Chat,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Sms, Channel::Push, Channel::Chat];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            "push" => Some(Self::Push),
            "chat" | "slack" => Some(Self::Chat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory only. Dispatch order never depends on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notification {id} is already {status:?}")]
pub struct TransitionError {
    pub id: String,
    pub status: NotificationStatus,
}

/// Inbound request as accepted by the HTTP boundary. Anything that is not a
/// record field is treated as channel content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: String,
    #[serde(alias = "type")]
    pub channel: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl NotificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        channel: impl Into<String>,
        recipient: impl Into<String>,
        content: Map<String, Value>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel: channel.into(),
            recipient: Some(recipient.into()),
            priority: Priority::Normal,
            content,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub channel: String,
    pub recipient: String,
    pub priority: Priority,
    pub status: NotificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl NotificationRecord {
    pub fn queued(request: NotificationRequest) -> Self {
        let NotificationRequest {
            user_id,
            channel,
            recipient,
            priority,
            content,
        } = request;
        let recipient = recipient
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| user_id.clone());
        Self {
            id: generate_id(),
            user_id,
            channel,
            recipient,
            priority,
            status: NotificationStatus::Queued,
            error: None,
            attempts: 0,
            timestamp: chrono::Utc::now(),
            content: normalize_content(content),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_sent(&mut self) -> Result<(), TransitionError> {
        self.ensure_queued()?;
        self.status = NotificationStatus::Sent;
        self.error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_queued()?;
        self.status = NotificationStatus::Failed;
        self.error = Some(reason.into());
        Ok(())
    }

    fn ensure_queued(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

pub fn generate_id() -> String {
    format!("notif_{}", uuid::Uuid::new_v4().simple())
}

/// Lifts a nested `content` object to the top level and drops reserved keys.
/// Top-level fields win over nested ones.
fn normalize_content(mut content: Map<String, Value>) -> Map<String, Value> {
    let nested = match content.remove("content") {
        Some(Value::Object(nested)) => nested,
        _ => Map::new(),
    };
    let mut merged = Map::new();
    for (key, value) in nested.into_iter().chain(content) {
        if RESERVED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        merged.insert(key, value);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> NotificationRequest {
        serde_json::from_value(value).expect("request")
    }

    #[test]
    fn request_accepts_type_alias_and_nested_content() {
        let req = request(json!({
            "user_id": "u1",
            "type": "email",
            "recipient": "a@b.com",
            "content": { "body": "hi" },
            "subject": "top"
        }));
        assert_eq!(req.channel, "email");

        let record = NotificationRecord::queued(req);
        assert_eq!(record.status, NotificationStatus::Queued);
        assert_eq!(record.content.get("body"), Some(&json!("hi")));
        assert_eq!(record.content.get("subject"), Some(&json!("top")));
        assert!(!record.content.contains_key("content"));
    }

    #[test]
    fn recipient_defaults_to_user_id() {
        let record = NotificationRecord::queued(request(json!({
            "user_id": "user-7",
            "channel": "sms",
            "message": "ping"
        })));
        assert_eq!(record.recipient, "user-7");
        assert_eq!(record.priority, Priority::Normal);
    }

    #[test]
    fn reserved_content_keys_are_dropped() {
        let mut content = Map::new();
        content.insert("status".to_string(), json!("sent"));
        content.insert("body".to_string(), json!("hello"));
        let record =
            NotificationRecord::queued(NotificationRequest::new("u", "email", "a@b.com", content));
        assert_eq!(record.status, NotificationStatus::Queued);
        assert!(!record.content.contains_key("status"));
    }

    #[test]
    fn terminal_states_do_not_transition() {
        let mut record = NotificationRecord::queued(NotificationRequest::new(
            "u",
            "push",
            "token",
            Map::new(),
        ));
        record.mark_failed("boom").expect("first transition");
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!(record.mark_sent().is_err());
        assert_eq!(record.status, NotificationStatus::Failed);
    }

    #[test]
    fn record_serializes_flat() {
        let mut content = Map::new();
        content.insert("body".to_string(), json!("hi"));
        let record =
            NotificationRecord::queued(NotificationRequest::new("u", "email", "a@b.com", content));
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["status"], json!("queued"));
        assert_eq!(value["body"], json!("hi"));
        assert!(value.get("error").is_none());

        let back: NotificationRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn channel_parse_accepts_slack_alias() {
        assert_eq!(Channel::parse("Slack"), Some(Channel::Chat));
        assert_eq!(Channel::parse("carrier_pigeon"), None);
    }
}
