//! Core types for the agent chat system.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an agent in the roster
pub type AgentId = String;

/// Who wrote a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    /// Older transcripts used the upstream API's `model` role name.
    #[serde(alias = "model")]
    Agent,
}

impl MessageRole {
    /// Role name used by the response service's conversation schema
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "model",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message ID (UUID)
    pub id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Markdown content; grows while the reply is streaming
    pub content: String,
    /// When the message was created
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new agent message
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Agent, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// RFC 3339 with nanoseconds so a saved transcript reloads to the same instant.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Availability shown on the agent card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Busy,
    Offline,
}

impl AgentStatus {
    /// Offline agents do not take chats
    pub fn accepts_chat(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Online => "online",
            Self::Busy => "busy",
            Self::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// Where an agent's picture comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AvatarRef {
    /// Seed for a deterministic placeholder image
    Seed { seed: String },
    /// Base64 image payload
    #[serde(rename_all = "camelCase")]
    Inline { mime_type: String, data: String },
}

impl AvatarRef {
    pub fn seed(seed: impl Into<String>) -> Self {
        Self::Seed { seed: seed.into() }
    }

    /// URL a front end can render directly
    pub fn url(&self) -> String {
        match self {
            Self::Seed { seed } => format!("https://picsum.photos/seed/{}/200", seed),
            Self::Inline { mime_type, data } => format!("data:{};base64,{}", mime_type, data),
        }
    }
}

/// A member of the hive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: String,
    pub description: String,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub avatar: AvatarRef,
}

impl Agent {
    /// Fields that steer the response service
    pub fn persona(&self) -> Persona {
        Persona {
            name: self.name.clone(),
            role: self.role.clone(),
            description: self.description.clone(),
        }
    }
}

/// Name, role and description passed along with every request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub role: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_model_role_reads_as_agent() {
        let json = r#"{"id":"init","role":"model","content":"hi","timestamp":"2025-01-01T10:00:00.123Z"}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.role, MessageRole::Agent);

        let written = serde_json::to_string(&message).unwrap();
        assert!(written.contains(r#""role":"agent""#));
    }

    #[test]
    fn test_timestamp_round_trips_exactly() {
        let message = Message::user("hello");
        let json = serde_json::to_string(&message).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timestamp, message.timestamp);
        assert_eq!(back, message);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let json = r#"{"id":"x","role":"system","content":"","timestamp":"2025-01-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_avatar_urls() {
        assert_eq!(
            AvatarRef::seed("coder").url(),
            "https://picsum.photos/seed/coder/200"
        );
        let inline = AvatarRef::Inline {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        };
        assert_eq!(inline.url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_offline_agents_refuse_chat() {
        assert!(AgentStatus::Online.accepts_chat());
        assert!(AgentStatus::Busy.accepts_chat());
        assert!(!AgentStatus::Offline.accepts_chat());
    }
}
