//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" converts between Rust types and raw bytes. The session layer
//! only needs something implementing [`Codec`]; the browsers this server
//! talks to speak JSON, so [`JsonCodec`] is the one in use.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is owned by the broadcaster,
/// which lives in shared server state for the whole process.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use trivia_protocol::{Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerMessage::NotifyAll("round two".into())).unwrap();
/// assert_eq!(bytes, br#"{"type":"notify_all","data":"round two"}"#);
///
/// let decoded: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ServerMessage::NotifyAll("round two".into()));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
