//! Event messages accepted by the dispatcher.
//!
//! A message is one analytics-style event (identify, track, page, ...). The
//! dispatcher never inspects the event-specific fields; it only needs the
//! message to serialize into a [`Payload`]. The variant is carried as data so
//! every kind flows through the same delivery path.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{CoreError, Result},
    payload::Payload,
};

/// Kind of event a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Ties a user to their traits.
    Identify,
    /// Merges two user identities.
    Alias,
    /// Associates a user with a group.
    Group,
    /// Records a user action.
    Track,
    /// Records a web page view.
    Page,
    /// Records a mobile screen view.
    Screen,
}

impl EventKind {
    /// All event kinds, in declaration order.
    pub const ALL: [Self; 6] =
        [Self::Identify, Self::Alias, Self::Group, Self::Track, Self::Page, Self::Screen];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identify => write!(f, "identify"),
            Self::Alias => write!(f, "alias"),
            Self::Group => write!(f, "group"),
            Self::Track => write!(f, "track"),
            Self::Page => write!(f, "page"),
            Self::Screen => write!(f, "screen"),
        }
    }
}

/// Source channel a message was collected from.
///
/// Used upstream for routing and quota decisions. Delivery treats every
/// channel the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Server-side libraries and HTTP API.
    #[default]
    Server,
    /// Mobile SDKs.
    Mobile,
    /// Browser libraries.
    Client,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Mobile => write!(f, "mobile"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// An event message ready for fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Event kind, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Channel the event arrived on, when the source recorded one.
    ///
    /// Left out of the serialized body when absent so the payload matches
    /// the inbound event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,

    /// Event-specific fields (`userId`, `event`, `properties`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    /// Creates an empty message of the given kind with no channel.
    pub fn new(kind: EventKind) -> Self {
        Self { kind, channel: None, fields: Map::new() }
    }

    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// The channel used for routing; messages without one count as server.
    pub fn source_channel(&self) -> Channel {
        self.channel.unwrap_or_default()
    }

    /// Adds or replaces one event field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Decodes a message from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidMessage` if the input is not a JSON object
    /// with a known `type`.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidMessage(e.to_string()))
    }

    /// Serializes the message into the payload that will be signed and sent.
    ///
    /// The returned bytes are final: the signature is computed over them and
    /// they are transmitted without re-encoding.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the fields cannot be encoded.
    pub fn to_payload(&self) -> Result<Payload> {
        let body = serde_json::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Payload::json(body))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_every_event_kind() {
        for kind in EventKind::ALL {
            let raw = format!(r#"{{"type":"{kind}","userId":"u-1"}}"#);
            let message = Message::from_json(raw.as_bytes()).unwrap();

            assert_eq!(message.kind, kind);
            assert_eq!(message.channel, None);
            assert_eq!(message.source_channel(), Channel::Server);
            assert_eq!(message.fields.get("userId"), Some(&json!("u-1")));
        }
    }

    #[test]
    fn channel_is_decoded_when_present() {
        let message = Message::from_json(br#"{"type":"screen","channel":"mobile"}"#).unwrap();
        assert_eq!(message.channel, Some(Channel::Mobile));
        assert_eq!(message.source_channel(), Channel::Mobile);
    }

    #[test]
    fn payload_matches_inbound_event_without_channel() {
        let raw = br#"{"type":"track","userId":"u-1","event":"Signed Up","properties":{"plan":"pro"}}"#;

        let payload = Message::from_json(raw).unwrap().to_payload().unwrap();

        let sent: Value = serde_json::from_slice(payload.as_bytes()).unwrap();
        let inbound: Value = serde_json::from_slice(raw).unwrap();
        assert_eq!(sent, inbound);
        assert!(sent.get("channel").is_none());
    }

    #[test]
    fn payload_keeps_inbound_key_order() {
        let raw = r#"{"type":"identify","userId":"u-1","traits":{"name":"Ada","email":"ada@example.com"},"anonymousId":"a-9"}"#;

        let payload = Message::from_json(raw.as_bytes()).unwrap().to_payload().unwrap();

        assert_eq!(payload.as_bytes(), raw.as_bytes());
    }

    #[test]
    fn explicit_channel_is_kept_in_payload() {
        let raw = br#"{"type":"screen","channel":"mobile","name":"Home"}"#;

        let payload = Message::from_json(raw).unwrap().to_payload().unwrap();
        let sent: Value = serde_json::from_slice(payload.as_bytes()).unwrap();

        assert_eq!(sent, serde_json::from_slice::<Value>(raw).unwrap());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Message::from_json(br#"{"type":"purchase"}"#).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn payload_contains_type_and_fields() {
        let message = Message::new(EventKind::Track)
            .with_field("event", "Signed Up")
            .with_field("properties", json!({"plan": "pro"}));

        let payload = message.to_payload().unwrap();
        let decoded: Value = serde_json::from_slice(payload.as_bytes()).unwrap();

        assert_eq!(payload.content_type(), "application/json");
        assert_eq!(decoded["type"], "track");
        assert!(decoded.get("channel").is_none());
        assert_eq!(decoded["event"], "Signed Up");
        assert_eq!(decoded["properties"]["plan"], "pro");
    }

    #[test]
    fn payload_is_stable_across_calls() {
        let message = Message::new(EventKind::Identify).with_field("userId", "u-42");

        let first = message.to_payload().unwrap();
        let second = message.to_payload().unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
    }
}
