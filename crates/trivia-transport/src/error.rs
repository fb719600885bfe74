//! Error types for the transport layer.

/// Errors that can occur while accepting or talking to a connection.
///
/// A send failure here is what the session layer reports as a delivery
/// error for a single participant.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade handshake was rejected or broke off.
    #[error("websocket handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer is gone; nothing more can be written.
    #[error("connection {0} closed")]
    ConnectionClosed(crate::ConnectionId),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
