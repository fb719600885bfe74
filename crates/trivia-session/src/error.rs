//! Error types for the session layer.

use trivia_protocol::ProtocolError;
use trivia_transport::ConnectionId;

/// Which part of the error taxonomy a [`SessionError`] belongs to.
///
/// Callers use this to decide how to surface a failure (HTTP status for the
/// admin surface, an `error` event on the realtime connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty, wrong, or expired access token.
    Auth,
    /// Session or participant not found.
    Lookup,
    /// A lifecycle transition that the current state does not allow.
    State,
}

/// Errors from token checks, lookups, and lifecycle transitions.
///
/// Whenever a `Session` method returns one of these, the session is left
/// exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No token was supplied at all.
    #[error("no access token supplied")]
    EmptyToken,

    /// A token was supplied but does not match.
    #[error("bad access token")]
    BadToken,

    /// The token's time-to-live ran out on this check.
    #[error("game has expired")]
    TokenExpired,

    /// The token had already been marked expired by an earlier check.
    #[error("game has already expired")]
    TokenAlreadyExpired,

    /// No session is registered under the token.
    #[error("there has been a problem accessing the game")]
    SessionNotFound,

    /// No participant with that name or connection in the pool searched.
    #[error("participant `{0}` not found")]
    ParticipantNotFound(String),

    /// The identity is already playing.
    #[error("username `{0}` exists, choose another")]
    NameTaken(String),

    /// The connection already owns an active participant.
    #[error("this connection is already playing as `{0}`")]
    AlreadyLoggedIn(String),

    /// A participant tried to answer the same question twice.
    #[error("`{0}` has already answered this question")]
    AlreadyResponded(String),

    /// A guess arrived before any question was installed.
    #[error("no question has been asked yet")]
    NoQuestion,
}

impl SessionError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyToken
            | Self::BadToken
            | Self::TokenExpired
            | Self::TokenAlreadyExpired => ErrorKind::Auth,
            Self::SessionNotFound | Self::ParticipantNotFound(_) => {
                ErrorKind::Lookup
            }
            Self::NameTaken(_)
            | Self::AlreadyLoggedIn(_)
            | Self::AlreadyResponded(_)
            | Self::NoQuestion => ErrorKind::State,
        }
    }
}

/// Errors from serializing or delivering an outbound event.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The event could not be serialized; nothing was sent.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// Writing to a single connection failed.
    #[error("delivery to {connection} failed: {reason}")]
    Delivery {
        connection: ConnectionId,
        reason: String,
    },
}
