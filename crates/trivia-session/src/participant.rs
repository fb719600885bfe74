//! A named player bound to one live connection.

use std::fmt;
use std::sync::Arc;

use trivia_protocol::PlayerView;
use trivia_transport::{Connection, ConnectionId};

/// A participant in a session.
///
/// Owned by exactly one of the session's two pools. The connection is
/// shared with the task reading from it, so it sits behind an `Arc`; the
/// id is cached because lookups by connection are frequent.
pub struct Participant<C> {
    identity: String,
    connection: Arc<C>,
    connection_id: ConnectionId,
    score: i64,
    external_id: String,
}

impl<C: Connection> Participant<C> {
    pub(crate) fn new(
        identity: impl Into<String>,
        connection: Arc<C>,
        external_id: impl Into<String>,
    ) -> Self {
        let connection_id = connection.id();
        Self {
            identity: identity.into(),
            connection,
            connection_id,
            score: 0,
            external_id: external_id.into(),
        }
    }

    /// Points onto a fresh connection after a resume.
    pub(crate) fn rebind(&mut self, connection: Arc<C>) {
        self.connection_id = connection.id();
        self.connection = connection;
    }
}

impl<C> Participant<C> {
    /// The display name; unique among active participants.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    /// Id the browser supplied in its connect URL, or empty.
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// What browsers get to see of this participant.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            name: self.identity.clone(),
            external_id: self.external_id.clone(),
            score: self.score,
        }
    }

    pub(crate) fn add_points(&mut self, points: i64) -> i64 {
        self.score += points;
        self.score
    }
}

impl<C> fmt::Debug for Participant<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("identity", &self.identity)
            .field("connection_id", &self.connection_id)
            .field("score", &self.score)
            .field("external_id", &self.external_id)
            .finish()
    }
}
