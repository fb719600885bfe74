//! Transport abstraction layer for the trivia coordinator.
//!
//! Provides the [`Transport`], [`Handshake`], and [`Connection`] traits so
//! the session and server layers never touch a socket type directly. Participants hold an
//! `Arc` of a [`Connection`] and are identified by its [`ConnectionId`],
//! never by the identity of the underlying transport object.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque, process-unique identifier for a connection.
///
/// Assigned once at accept time. Lookups "by connection" compare these ids,
/// which stay valid even after the socket behind them is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming sockets.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced once a handshake completes.
    type Connection: Connection;
    /// A socket that has been accepted but not yet upgraded.
    type Pending: Handshake<Connection = Self::Connection>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming socket.
    ///
    /// Only the raw accept happens here. The protocol handshake is left to
    /// [`Handshake::complete`], which the caller runs on its own task, so a
    /// peer that connects and then goes quiet never stalls the listener.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted socket waiting for its protocol handshake.
pub trait Handshake: Send + 'static {
    /// The connection produced on success.
    type Connection: Connection;
    /// The error type for a failed handshake.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Performs the handshake. Has no deadline of its own; callers wrap it
    /// in a timeout.
    fn complete(
        self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single live connection that can send and receive bytes.
///
/// The futures are declared `Send` so a broadcast can spawn one delivery
/// task per participant onto the multi-threaded runtime.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends data to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(1);
        let c = ConnectionId::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_connection_id_hash_works_as_set_member() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        assert!(seen.insert(ConnectionId::new(1)));
        assert!(seen.insert(ConnectionId::new(2)));
        assert!(!seen.insert(ConnectionId::new(1)));
    }
}
