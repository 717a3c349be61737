/*
    Message - the unit exchanged between stores

    Encoded as JSON:
    ```json
    {
        "id": "0b6c...",
        "type": "get",
        "path": "sensors.temp",
        "value": 21.5,
        "error": "optional, only on value",
        "limit": 10
    }
    ```

    `path` is always relative to the receiver's namespace.

    | type        | id                         | value    |
    |-------------|----------------------------|----------|
    | get         | request id                 | -        |
    | value       | request id being answered  | optional |
    | set         | fresh                      | required |
    | push        | fresh                      | required |
    | subscribe   | subscription id            | -        |
    | unsubscribe | subscription id            | -        |
    | event       | subscription id            | required |
*/

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Get,
    Value,
    Set,
    Push,
    Subscribe,
    Unsubscribe,
    Event,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Get => "get",
            MessageKind::Value => "value",
            MessageKind::Set => "set",
            MessageKind::Push => "push",
            MessageKind::Subscribe => "subscribe",
            MessageKind::Unsubscribe => "unsubscribe",
            MessageKind::Event => "event",
        }
    }

    fn carries_value(&self) -> bool {
        matches!(self, MessageKind::Set | MessageKind::Push | MessageKind::Event)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub path: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Keep an explicit `null` as `Some(Value::Null)`; only an absent field is `None`
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(id: String, kind: MessageKind, path: impl Into<String>) -> Self {
        Message {
            id,
            kind,
            path: path.into(),
            value: None,
            error: None,
            limit: None,
        }
    }

    pub fn get(id: impl Into<String>, path: impl Into<String>) -> Self {
        Message::new(id.into(), MessageKind::Get, path)
    }

    /// Answer to a `get`, carrying either the value or the failure text
    pub fn value(id: impl Into<String>, path: impl Into<String>, result: Result<Value, String>) -> Self {
        let mut message = Message::new(id.into(), MessageKind::Value, path);
        match result {
            Ok(value) => message.value = Some(value),
            Err(error) => message.error = Some(error),
        }
        message
    }

    pub fn set(path: impl Into<String>, value: Value) -> Self {
        let mut message = Message::new(fresh_id(), MessageKind::Set, path);
        message.value = Some(value);
        message
    }

    pub fn push(path: impl Into<String>, value: Value, limit: Option<usize>) -> Self {
        let mut message = Message::new(fresh_id(), MessageKind::Push, path);
        message.value = Some(value);
        message.limit = limit;
        message
    }

    pub fn subscribe(id: impl Into<String>, path: impl Into<String>) -> Self {
        Message::new(id.into(), MessageKind::Subscribe, path)
    }

    pub fn unsubscribe(id: impl Into<String>, path: impl Into<String>) -> Self {
        Message::new(id.into(), MessageKind::Unsubscribe, path)
    }

    pub fn event(id: impl Into<String>, path: impl Into<String>, value: Value) -> Self {
        let mut message = Message::new(id.into(), MessageKind::Event, path);
        message.value = Some(value);
        message
    }

    /// Check the fields this message's type depends on
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err(format!("{} message without id", self.kind));
        }
        if self.kind.carries_value() && self.value.is_none() {
            return Err(format!("{} message without value", self.kind));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
