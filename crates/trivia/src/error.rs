//! Unified error type for the trivia server.

use trivia_protocol::ProtocolError;
use trivia_session::{BroadcastError, SessionError};
use trivia_transport::TransportError;

/// Error categories, as reported to clients.
///
/// The first three come straight from [`SessionError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Lookup,
    State,
    /// Malformed inbound payload or admin input.
    Protocol,
    /// A write to a connection failed.
    Delivery,
    /// Anything else: sockets, serialization of our own events.
    Internal,
}

impl From<trivia_session::ErrorKind> for ErrorKind {
    fn from(kind: trivia_session::ErrorKind) -> Self {
        match kind {
            trivia_session::ErrorKind::Auth => Self::Auth,
            trivia_session::ErrorKind::Lookup => Self::Lookup,
            trivia_session::ErrorKind::State => Self::State,
        }
    }
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TriviaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, invalid message, bad answer).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (token, lookup, lifecycle).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Encoding or delivering an outbound event failed.
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    /// Binding or serving the admin listener failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TriviaError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(e) => e.kind().into(),
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Broadcast(BroadcastError::Delivery { .. }) => ErrorKind::Delivery,
            Self::Transport(
                TransportError::SendFailed(_) | TransportError::ConnectionClosed(_),
            ) => ErrorKind::Delivery,
            Self::Broadcast(BroadcastError::Encode(_))
            | Self::Transport(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use trivia_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed(ConnectionId::new(3));
        let trivia_err: TriviaError = err.into();
        assert!(matches!(trivia_err, TriviaError::Transport(_)));
        assert!(trivia_err.to_string().contains("conn-3"));
        assert_eq!(trivia_err.kind(), ErrorKind::Delivery);
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let trivia_err: TriviaError = err.into();
        assert!(matches!(trivia_err, TriviaError::Protocol(_)));
        assert_eq!(trivia_err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_from_session_error_keeps_session_kind() {
        let trivia_err: TriviaError = SessionError::BadToken.into();
        assert_eq!(trivia_err.kind(), ErrorKind::Auth);

        let trivia_err: TriviaError = SessionError::NameTaken("a".into()).into();
        assert_eq!(trivia_err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_from_io_error_is_internal() {
        let err = std::io::Error::other("boom");
        let trivia_err: TriviaError = err.into();
        assert_eq!(trivia_err.kind(), ErrorKind::Internal);
    }
}
