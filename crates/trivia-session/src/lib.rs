//! Session coordination for live trivia games.
//!
//! This crate owns the state of every running game:
//!
//! 1. **Access**: each session is guarded by an [`AccessToken`]; the
//!    [`SessionRegistry`] maps token values to sessions
//! 2. **Participants**: the [`Session`] keeps an active and a benched pool
//!    so a dropped player can resume with their score intact
//! 3. **Questions and scoring**: the current [`Question`], who has
//!    answered it, and the only path that changes a score
//! 4. **Fan-out**: the [`Broadcaster`] serializes an event once and
//!    writes it to every active participant concurrently
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← read loops and admin requests resolve sessions here
//!     ↕
//! Session Layer (this crate)  ← participants, tokens, questions, scores
//!     ↕
//! Protocol / Transport (below)  ← wire types, AnswerBitmap, Connection
//! ```
//!
//! Sessions are shared as [`SessionHandle`]s (`Arc<Mutex<Session>>`), so
//! every mutation of a given session is serialized.

mod broadcast;
mod config;
mod error;
mod participant;
mod question;
mod registry;
mod session;
mod token;

#[cfg(test)]
mod test_support;

pub use broadcast::{Broadcaster, DEFAULT_SEND_TIMEOUT, DeliveryReport, Recipient};
pub use config::SessionConfig;
pub use error::{BroadcastError, ErrorKind, SessionError};
pub use participant::Participant;
pub use question::{Answer, Question};
pub use registry::SessionRegistry;
pub use session::{LoginOutcome, Session, SessionHandle};
pub use token::AccessToken;
