//! Messaging session lifecycle.

use crate::config::DeviceConfig;
use crate::error::SessionError;
use crate::transport::Transport;
use devicelink_proto::{encode_topic, validate_properties, DeviceTopics, Message};
use std::ops::{Deref, DerefMut};

/// Lifecycle state of a [`MessagingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, `start` not yet completed
    NotStarted,
    /// Connected and subscribed
    Started,
    /// `stop` has run
    Stopped,
}

/// A publish/subscribe session bound to one device.
///
/// Topics are derived once at construction. `start`, `send` and `stop` are
/// blocking and hold no lock; `send` only needs `&self`.
pub struct MessagingSession<T> {
    topics: DeviceTopics,
    transport: T,
    state: SessionState,
}

impl<T: Transport> MessagingSession<T> {
    /// Create a session for the configured device.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if identity, credentials, or
    /// security context are empty. Nothing is sent to the transport.
    pub fn new(config: &DeviceConfig, transport: T) -> Result<Self, SessionError> {
        config.validate()?;
        let topics = DeviceTopics::new(config.device_id.as_str())?;

        tracing::debug!(
            device_id = topics.device_id(),
            publish_topic = topics.publish_topic(),
            subscribe_topic = topics.subscribe_topic(),
            "Derived device topics"
        );

        Ok(Self {
            topics,
            transport,
            state: SessionState::NotStarted,
        })
    }

    /// Connect, then subscribe to cloud-to-device messages.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] with the transport error if either step
    /// fails. Nothing is retried; the state is left unchanged.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Started {
            tracing::warn!(
                device_id = self.topics.device_id(),
                "Session already started, connecting again"
            );
        }

        tracing::info!(device_id = self.topics.device_id(), "Starting messaging session");
        self.transport.connect()?;

        let topic = self.topics.subscribe_topic();
        tracing::info!(topic, "Subscribing to devicebound messages");
        self.transport.subscribe(topic)?;

        self.state = SessionState::Started;
        Ok(())
    }

    /// Disconnect and reset the transport.
    ///
    /// The reset runs exactly once whether or not the disconnect succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] with the disconnect error, after the reset.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        tracing::info!(device_id = self.topics.device_id(), "Stopping messaging session");

        let mut transport = ResetOnDrop(&mut self.transport);
        let result = transport.disconnect();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "Disconnect failed, resetting transport");
        }
        drop(transport);

        self.state = SessionState::Stopped;
        result.map_err(SessionError::from)
    }

    /// Publish one message.
    ///
    /// Properties and the message id are encoded into the publish topic.
    /// Delivery confirmation is up to the transport.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidMessage`] for a missing message, a missing
    ///   payload, or properties that cannot be encoded
    /// - [`SessionError::NotStarted`] if `start` has not completed
    /// - [`SessionError::Io`] if the transport rejects the publish
    pub fn send<'m>(&self, message: impl Into<Option<&'m Message>>) -> Result<(), SessionError> {
        let message = message
            .into()
            .ok_or_else(|| SessionError::InvalidMessage("message cannot be null".to_string()))?;
        let payload = message.payload().ok_or_else(|| {
            SessionError::InvalidMessage("message payload cannot be null".to_string())
        })?;
        validate_properties(message.properties(), message.message_id())?;

        if self.state != SessionState::Started {
            return Err(SessionError::NotStarted(self.state));
        }

        let topic = encode_topic(
            self.topics.publish_topic(),
            message.properties(),
            message.message_id(),
        );

        tracing::debug!(topic, payload_len = payload.len(), "Publishing message");

        self.transport.publish(&topic, payload)?;
        Ok(())
    }

    /// Topics derived for this device.
    #[must_use]
    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Resets the wrapped transport when dropped, including during unwinding.
struct ResetOnDrop<'a, T: Transport>(&'a mut T);

impl<T: Transport> Deref for ResetOnDrop<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

impl<T: Transport> DerefMut for ResetOnDrop<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.0
    }
}

impl<T: Transport> Drop for ResetOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, SecurityContext};
    use crate::transport::TransportError;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingTransport {
        resets: Arc<AtomicUsize>,
        panic_on_disconnect: bool,
    }

    impl Transport for CountingTransport {
        fn connect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn subscribe(&mut self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), TransportError> {
            assert!(!self.panic_on_disconnect, "link torn down mid-flight");
            Ok(())
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(device_id: &str) -> DeviceConfig {
        DeviceConfig::new(
            "hub.example.net",
            device_id,
            Credentials::new("user", "pass"),
            SecurityContext::new(b"ca".to_vec()),
        )
    }

    #[test]
    fn lifecycle_transitions() {
        let mut session =
            MessagingSession::new(&config("dev1"), CountingTransport::default()).unwrap();
        assert_eq!(session.state(), SessionState::NotStarted);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);
    }

    #[test]
    fn stop_from_not_started_still_resets() {
        let transport = CountingTransport::default();
        let resets = Arc::clone(&transport.resets);
        let mut session = MessagingSession::new(&config("dev1"), transport).unwrap();

        session.stop().unwrap();

        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn reset_runs_when_disconnect_panics() {
        let transport = CountingTransport {
            panic_on_disconnect: true,
            ..CountingTransport::default()
        };
        let resets = Arc::clone(&transport.resets);
        let mut session = MessagingSession::new(&config("dev1"), transport).unwrap();

        let outcome = catch_unwind(AssertUnwindSafe(|| session.stop()));

        assert!(outcome.is_err());
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_before_start_is_rejected() {
        let session = MessagingSession::new(&config("dev1"), CountingTransport::default()).unwrap();

        let err = session.send(&Message::new("x")).unwrap_err();
        assert_eq!(err, SessionError::NotStarted(SessionState::NotStarted));
    }

    #[test]
    fn device_id_with_wildcard_is_configuration_error() {
        let result = MessagingSession::new(&config("dev/#"), CountingTransport::default());
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }

    #[test]
    fn boxed_transport_is_a_transport() {
        let transport: Box<dyn Transport> = Box::new(CountingTransport::default());
        let mut session = MessagingSession::new(&config("dev1"), transport).unwrap();
        session.start().unwrap();
        session.send(&Message::new("x")).unwrap();
    }
}
