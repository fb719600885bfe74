//! Wire protocol for the trivia coordinator.
//!
//! This crate defines the "language" spoken between browsers, the
//! administrative surface, and the session coordinator:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`PlayerView`], etc.):
//!   the JSON structures that travel over the realtime connection.
//! - **Answers** ([`AnswerBitmap`]): the compact 16-bit encoding of
//!   multi-select answers, including the multi-select marker bit.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages are turned
//!   into bytes and back.
//! - **Errors** ([`ProtocolError`]): malformed payloads and encode failures.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Session (participants, scores)
//! ```
//!
//! The protocol layer knows nothing about connections or sessions.

mod answer;
mod codec;
mod error;
mod types;

pub use answer::{AnswerBitmap, MAX_CHOICES, MULTI_SELECT_MARKER};
pub use codec::Codec;
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, ClientMessageKind, GuessData, PlayerView, QuestionView,
    ScoreEntry, ServerMessage,
};
