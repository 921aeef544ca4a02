//! # devicelink Session
//!
//! Lifecycle of a device messaging session over an MQTT broker connection.
//!
//! ## Lifecycle
//!
//! - `start`: connect, then subscribe to the devicebound topic filter
//! - `send`: encode message metadata into the publish topic and publish
//! - `stop`: disconnect, then always reset the transport
//!
//! The session delegates all network work to a [`Transport`]. The provided
//! [`MqttTransport`] drives `rumqttc` on a private runtime and exposes
//! blocking calls.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod mqtt;
pub mod session;
pub mod transport;

pub use config::{Credentials, DeviceConfig, SecurityContext};
pub use error::SessionError;
pub use mqtt::MqttTransport;
pub use session::{MessagingSession, SessionState};
pub use transport::{Transport, TransportError};
