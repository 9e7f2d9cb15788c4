use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::destination::Destination;

/// Property carrying the message group identifier
pub const GROUP_ID_PROPERTY: &str = "JMSXGroupID";

/// Payload carried by a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// UTF-8 text payload
    Text(String),

    /// Opaque byte payload
    Bytes(Bytes),

    /// No payload; used for control messages
    Empty,
}

impl MessageBody {
    /// Short name of the payload kind, used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Text(_) => "text",
            MessageBody::Bytes(_) => "bytes",
            MessageBody::Empty => "control",
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        match self {
            MessageBody::Text(text) => text.len(),
            MessageBody::Bytes(bytes) => bytes.len(),
            MessageBody::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Message data for sending through a producer
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Payload
    pub body: MessageBody,

    /// String properties (e.g. the message group id)
    pub properties: HashMap<String, String>,
}

impl OutgoingMessage {
    /// Create a text message
    ///
    /// # Example
    ///
    /// ```
    /// use jms_tools::client::{MessageBody, OutgoingMessage};
    ///
    /// let msg = OutgoingMessage::text("Message 0").with_group_id("orders");
    /// assert_eq!(msg.body, MessageBody::Text("Message 0".to_string()));
    /// assert_eq!(msg.group_id(), Some("orders"));
    /// ```
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Text(text.into()))
    }

    /// Create a byte message
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(MessageBody::Bytes(bytes.into()))
    }

    /// Create a payload-less control message
    pub fn control() -> Self {
        Self::new(MessageBody::Empty)
    }

    fn new(body: MessageBody) -> Self {
        Self {
            body,
            properties: HashMap::new(),
        }
    }

    /// Set a string property (builder pattern)
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the message group id (builder pattern)
    pub fn with_group_id(self, group_id: impl Into<String>) -> Self {
        self.with_property(GROUP_ID_PROPERTY, group_id)
    }

    /// Get the message group id if present
    pub fn group_id(&self) -> Option<&str> {
        self.properties.get(GROUP_ID_PROPERTY).map(String::as_str)
    }
}

/// Message delivered to a consumer or listed by a browser
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique identifier assigned when the message was sent
    pub id: Uuid,

    /// Destination the message was sent to
    pub destination: Destination,

    /// Payload
    pub body: MessageBody,

    /// String properties
    pub properties: HashMap<String, String>,

    /// UTC timestamp when the message was sent
    pub timestamp: DateTime<Utc>,

    /// Set when the message has been delivered before without being acknowledged
    pub redelivered: bool,
}

impl Message {
    /// Stamp an outgoing message for delivery
    pub fn from_outgoing(destination: Destination, outgoing: OutgoingMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination,
            body: outgoing.body,
            properties: outgoing.properties,
            timestamp: Utc::now(),
            redelivered: false,
        }
    }

    /// Text payload, if this is a text message
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Get the message group id if present
    pub fn group_id(&self) -> Option<&str> {
        self.property(GROUP_ID_PROPERTY)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ id: {}, destination: {}, kind: {}, length: {}, redelivered: {} }}",
            self.id,
            self.destination,
            self.body.kind(),
            self.body.len(),
            self.redelivered
        )
    }
}

/// Whether the broker should persist messages sent by a producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    Persistent,
    NonPersistent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DestinationKind;

    #[test]
    fn test_outgoing_message_builder() {
        let msg = OutgoingMessage::text("hello")
            .with_property("color", "red")
            .with_group_id("group-1");

        assert_eq!(msg.body, MessageBody::Text("hello".to_string()));
        assert_eq!(msg.properties.get("color").map(String::as_str), Some("red"));
        assert_eq!(msg.group_id(), Some("group-1"));
    }

    #[test]
    fn test_body_kind_and_len() {
        assert_eq!(MessageBody::Text("abc".to_string()).kind(), "text");
        assert_eq!(MessageBody::Bytes(Bytes::from_static(&[0, 1])).len(), 2);
        assert_eq!(MessageBody::Empty.kind(), "control");
        assert!(MessageBody::Empty.is_empty());
    }

    #[test]
    fn test_message_from_outgoing() {
        let destination = Destination::new("orders", DestinationKind::Queue);
        let msg = Message::from_outgoing(
            destination.clone(),
            OutgoingMessage::text("hi").with_group_id("g"),
        );

        assert_eq!(msg.destination, destination);
        assert_eq!(msg.text(), Some("hi"));
        assert_eq!(msg.group_id(), Some("g"));
        assert!(!msg.redelivered);
    }

    #[test]
    fn test_message_display() {
        let destination = Destination::new("orders", DestinationKind::Queue);
        let msg = Message::from_outgoing(destination, OutgoingMessage::control());
        let rendered = msg.to_string();
        assert!(rendered.contains("queue://orders"));
        assert!(rendered.contains("kind: control"));
    }
}
