//! Error types for the session layer.

use crate::session::SessionState;
use crate::transport::TransportError;
use devicelink_proto::{EncodingError, TopicError};

/// Errors surfaced by [`MessagingSession`](crate::MessagingSession).
///
/// Transport failures are carried unchanged in [`SessionError::Io`]; the
/// session never retries or suppresses them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Identity, credentials, or security context are missing or malformed.
    /// No session is produced.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller passed no message, a message without payload, or metadata
    /// that cannot be encoded.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// `send` was called before a successful `start`.
    #[error("session is not started (state: {0:?})")]
    NotStarted(SessionState),

    /// The transport failed during connect, subscribe, publish, or disconnect.
    #[error(transparent)]
    Io(#[from] TransportError),
}

impl From<TopicError> for SessionError {
    fn from(err: TopicError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<EncodingError> for SessionError {
    fn from(err: EncodingError) -> Self {
        Self::InvalidMessage(err.to_string())
    }
}
