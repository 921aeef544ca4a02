//! Transport collaborator consumed by the session.

/// Broker operations the session is built on.
///
/// Implementations own connection mechanics (TLS, framing, keep-alive, QoS
/// retries, reconnects). Every call blocks until the operation has been handed
/// to the connection or has failed.
pub trait Transport {
    /// Establish the broker connection.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be established.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Subscribe to a topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription is refused or cannot be sent.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Publish a payload on a topic.
    ///
    /// Takes `&self` so concurrent senders need no lock of their own.
    ///
    /// # Errors
    ///
    /// Returns error if the publish cannot be handed to the connection.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Tear down the broker connection.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect cannot be sent.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Discard all connection state so the next `connect` starts clean.
    fn reset(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        (**self).subscribe(topic)
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        (**self).publish(topic, payload)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Errors reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection failed or was refused
    #[error("connection error: {0}")]
    Connect(String),
    /// Subscription failed or was refused
    #[error("subscription error: {0}")]
    Subscribe(String),
    /// Publish failed
    #[error("publish error: {0}")]
    Publish(String),
    /// Disconnect failed
    #[error("disconnect error: {0}")]
    Disconnect(String),
    /// Operation requires an established connection
    #[error("transport is not connected")]
    NotConnected,
    /// Broker did not answer in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    /// Invalid broker address or TLS material
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}
