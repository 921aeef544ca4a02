//! Publish topic encoding for outgoing messages.
//!
//! Properties and the message id are appended to the publish topic as
//! `name=value` entries joined with `&`:
//!
//! ```text
//! devices/<deviceId>/messages/events/[<props>][&$.mid=<messageId>]
//! ```
//!
//! Names, values and the message id are percent-encoded so that the reserved
//! separators can never appear unescaped inside an entry.

use crate::message::MessageProperty;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;

/// Separator between consecutive entries.
pub const PROPERTY_SEPARATOR: char = '&';

/// Separator between a name and its value.
pub const PAIR_SEPARATOR: char = '=';

/// Reserved key carrying the message id.
pub const MESSAGE_ID_KEY: &str = "$.mid";

/// Characters escaped inside names, values and the message id.
/// Non-ASCII bytes are always escaped as UTF-8.
const ENTRY_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'&')
    .add(b'=')
    .add(b'/')
    .add(b'#')
    .add(b'+')
    .add(b'?');

/// Build the publish topic for a message.
///
/// With no properties and no message id the result is exactly `base`.
/// Otherwise every property is appended in order, followed by the message id
/// under [`MESSAGE_ID_KEY`]; `&` precedes every entry except the first.
///
/// # Examples
///
/// ```
/// use devicelink_proto::{encode_topic, MessageProperty};
///
/// let base = "devices/dev1/messages/events/";
/// let props = [MessageProperty::new("a", "1"), MessageProperty::new("b", "2")];
///
/// assert_eq!(encode_topic(base, &[], None), base);
/// assert_eq!(
///     encode_topic(base, &props, Some("m1")),
///     "devices/dev1/messages/events/a=1&b=2&$.mid=m1"
/// );
/// assert_eq!(
///     encode_topic(base, &[], Some("m1")),
///     "devices/dev1/messages/events/$.mid=m1"
/// );
/// ```
#[must_use]
pub fn encode_topic(
    base: &str,
    properties: &[MessageProperty],
    message_id: Option<&str>,
) -> String {
    let entries = properties
        .iter()
        .map(|p| (encode_entry(&p.name), encode_entry(&p.value)))
        .chain(message_id.map(|id| (Cow::Borrowed(MESSAGE_ID_KEY), encode_entry(id))));

    let mut topic = String::from(base);
    for (index, (name, value)) in entries.enumerate() {
        if index > 0 {
            topic.push(PROPERTY_SEPARATOR);
        }
        topic.push_str(&name);
        topic.push(PAIR_SEPARATOR);
        topic.push_str(&value);
    }
    topic
}

/// Check that a message's properties and id can be encoded unambiguously.
///
/// # Errors
///
/// Returns error if a property name is empty, a property uses the reserved
/// [`MESSAGE_ID_KEY`] name, or the message id is empty.
pub fn validate_properties(
    properties: &[MessageProperty],
    message_id: Option<&str>,
) -> Result<(), EncodingError> {
    for (index, property) in properties.iter().enumerate() {
        if property.name.is_empty() {
            return Err(EncodingError::EmptyPropertyName { index });
        }
        if property.name == MESSAGE_ID_KEY {
            return Err(EncodingError::ReservedPropertyName(property.name.clone()));
        }
    }

    if message_id.is_some_and(str::is_empty) {
        return Err(EncodingError::EmptyMessageId);
    }

    Ok(())
}

fn encode_entry(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, ENTRY_ESCAPE).into()
}

/// Errors for messages whose metadata cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A property has an empty name
    #[error("property at index {index} has an empty name")]
    EmptyPropertyName {
        /// Position of the property in the message
        index: usize,
    },
    /// A property collides with the reserved message id key
    #[error("property name '{0}' is reserved for the message id")]
    ReservedPropertyName(String),
    /// Message id is present but empty
    #[error("message id must not be empty")]
    EmptyMessageId,
}
