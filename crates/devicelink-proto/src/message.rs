//! Outgoing device-to-cloud messages.

use serde::{Deserialize, Serialize};

/// A single application property carried in the publish topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperty {
    /// Property name
    pub name: String,
    /// Property value
    pub value: String,
}

impl MessageProperty {
    /// Create a new property.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An outgoing message.
///
/// Properties keep their insertion order, which is also their order on the
/// wire. A message built with [`Message::default`] has no payload and is
/// rejected when sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    properties: Vec<MessageProperty>,
    message_id: Option<String>,
    payload: Option<Vec<u8>>,
}

impl Message {
    /// Create a message with the given body.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            properties: Vec::new(),
            message_id: None,
            payload: Some(payload.into()),
        }
    }

    /// Append an application property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(MessageProperty::new(name, value));
        self
    }

    /// Append several properties, preserving their order.
    #[must_use]
    pub fn with_properties(
        mut self,
        properties: impl IntoIterator<Item = MessageProperty>,
    ) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Set the message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Application properties in insertion order.
    #[must_use]
    pub fn properties(&self) -> &[MessageProperty] {
        &self.properties
    }

    /// Message id, if set.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Message body, if set.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}
