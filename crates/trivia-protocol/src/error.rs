//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means "the bytes or fields were wrong", never
//! "the network failed" or "the participant does not exist".

/// Errors that can occur in the protocol layer.
///
/// On the realtime connection these are reported back to the sender and
/// the read loop keeps going; a malformed message never ends a session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type`, or a
    /// field of the wrong shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates protocol rules, e.g. a `guess`
    /// without `data` or an empty username.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A choice index outside `1..=15`, or past the end of the choice list.
    #[error("choice index {0} is out of range")]
    ChoiceOutOfRange(u32),

    /// An answer bitmap needs at least one correct choice.
    #[error("answer has no correct choices")]
    EmptyAnswer,
}
