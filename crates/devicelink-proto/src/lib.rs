//! # devicelink Protocol
//!
//! Topic scheme and outgoing message encoding for device-to-cloud telemetry.
//!
//! ## Topics
//!
//! Every topic is derived from the device identifier once:
//!
//! - publish: `devices/{device_id}/messages/events/`
//! - subscribe: `devices/{device_id}/messages/devicebound/#`
//! - receive prefix: `devices/{device_id}/messages/devicebound/`
//!
//! ## Message properties
//!
//! Application properties and the message id travel in the publish topic:
//! `devices/{device_id}/messages/events/a=1&b=2&$.mid=m1`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod message;
pub mod topics;

pub use encoding::{encode_topic, validate_properties, EncodingError, MESSAGE_ID_KEY};
pub use message::{Message, MessageProperty};
pub use topics::{DeviceTopics, TopicError};
