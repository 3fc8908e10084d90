//! Chat and message types.
//!
//! These mirror the OpenAI-style chat completion body closely enough to be
//! hydrated in place. Anything the hydrator does not understand (extra
//! request fields, extra message fields, structured content) is carried
//! through untouched so the forwarded request stays faithful.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Any other role name (e.g. "tool").
    #[serde(untagged)]
    Other(String),
    /// A role that is not a string at all. Kept verbatim.
    #[serde(untagged)]
    Malformed(Value),
}

impl Role {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(name) => match name.as_str() {
                "system" => Role::System,
                "user" => Role::User,
                "assistant" => Role::Assistant,
                _ => Role::Other(name),
            },
            other => Role::Malformed(other),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Role::from_value)
    }
}

/// Message content: plain text, or anything else (content parts, null).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl MessageContent {
    /// The text, if this is plain string content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
        }
    }
}

/// A chat message in a conversation.
///
/// `role` and `content` are `None` only when the field is absent from the
/// body; an explicit `null` is kept as a value so it serializes back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<Role>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<MessageContent>,
    /// Fields the hydrator passes through (name, tool_calls, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            content: Some(MessageContent::Text(content.into())),
            extra: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Some(Role::User)
    }

    /// The content, if it is plain text.
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(MessageContent::as_text)
    }

    /// A copy of this message with its content replaced by `text`.
    pub fn with_text(&self, text: String) -> Self {
        Self {
            role: self.role.clone(),
            content: Some(MessageContent::Text(text)),
            extra: self.extra.clone(),
        }
    }
}

/// A chat completion request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Conversation messages, in order.
    pub messages: Vec<Message>,
    /// Request fields the hydrator passes through (model, stream, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chat {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            extra: Map::new(),
        }
    }
}
