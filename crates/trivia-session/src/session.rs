//! One trivia game: two participant pools, the current question, and the
//! access token.
//!
//! A participant is always in exactly one pool:
//!
//! ```text
//!   login ──→ Active ──(bench)──→ Benched
//!               ↑                    │
//!               └─────(unbench)──────┘
//! ```
//!
//! - **Active**: connected and playing; receives broadcasts and is counted
//!   when deciding whether everyone has answered.
//! - **Benched**: connection lost. The score is kept and the identity stays
//!   reserved, so logging in again under the same name resumes the game.
//!
//! There is no terminal state; participants live as long as the session.
//!
//! Every operation here is synchronous and does no I/O. Callers hold the
//! session's lock (see [`SessionHandle`]) only for the duration of a call
//! and send messages after releasing it.

use std::sync::Arc;

use tokio::sync::Mutex;
use trivia_protocol::{PlayerView, ScoreEntry};
use trivia_transport::{Connection, ConnectionId};

use crate::{
    AccessToken, Answer, Participant, Question, Recipient, SessionConfig,
    SessionError,
};

/// Shared, lock-guarded access to a session.
///
/// When both are needed, take the registry lock before the session lock.
pub type SessionHandle<C> = Arc<Mutex<Session<C>>>;

/// How a successful login was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A new participant was created with score 0.
    Joined,
    /// A benched participant with that name was moved back to active.
    Resumed,
}

/// A single trivia game.
pub struct Session<C> {
    name: String,
    token: AccessToken,
    active: Vec<Participant<C>>,
    benched: Vec<Participant<C>>,
    question: Option<Question>,
}

impl<C: Connection> Session<C> {
    /// Opens a session with a freshly generated token.
    pub fn new(name: impl Into<String>, config: &SessionConfig) -> Self {
        let token = AccessToken::generate(config.token_len, config.token_ttl_secs);
        Self::with_token(name, token)
    }

    /// Opens a session around an existing token.
    pub fn with_token(name: impl Into<String>, token: AccessToken) -> Self {
        Self {
            name: name.into(),
            token,
            active: Vec::new(),
            benched: Vec::new(),
            question: None,
        }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Admits `identity` on `connection`.
    ///
    /// A benched participant with the same identity is resumed on the new
    /// connection with its score intact; this bypasses the token expiry
    /// check. A brand-new participant is only admitted while the token has
    /// not expired.
    ///
    /// # Errors
    /// - [`SessionError::NameTaken`] if `identity` is already active
    /// - [`SessionError::AlreadyLoggedIn`] if `connection` already plays
    /// - [`SessionError::TokenExpired`] / [`SessionError::TokenAlreadyExpired`]
    ///   for a new participant after the token lapsed
    pub fn login(
        &mut self,
        identity: &str,
        connection: Arc<C>,
        external_id: &str,
    ) -> Result<LoginOutcome, SessionError> {
        if self.active.iter().any(|p| p.identity() == identity) {
            return Err(SessionError::NameTaken(identity.to_owned()));
        }
        if let Ok(current) = self.participant_by_connection(connection.id()) {
            return Err(SessionError::AlreadyLoggedIn(
                current.identity().to_owned(),
            ));
        }

        if self.benched.iter().any(|p| p.identity() == identity) {
            self.unbench(identity, connection)?;
            return Ok(LoginOutcome::Resumed);
        }

        self.token.check_expiration()?;

        let participant = Participant::new(identity, connection, external_id);
        tracing::info!(
            session = %self.name,
            participant = identity,
            connection = %participant.connection_id(),
            "participant joined"
        );
        self.active.push(participant);
        Ok(LoginOutcome::Joined)
    }

    /// Moves the participant on `connection` from active to benched.
    ///
    /// # Errors
    /// [`SessionError::ParticipantNotFound`] if no active participant owns
    /// the connection.
    pub fn bench(
        &mut self,
        connection: ConnectionId,
    ) -> Result<&Participant<C>, SessionError> {
        let index = self
            .active
            .iter()
            .position(|p| p.connection_id() == connection)
            .ok_or_else(|| SessionError::ParticipantNotFound(connection.to_string()))?;

        let participant = self.active.remove(index);
        tracing::info!(
            session = %self.name,
            participant = participant.identity(),
            score = participant.score(),
            "participant benched"
        );
        self.benched.push(participant);
        Ok(&self.benched[self.benched.len() - 1])
    }

    /// Moves a benched participant back to active on a new connection.
    ///
    /// # Errors
    /// [`SessionError::ParticipantNotFound`] if `identity` is not benched.
    pub fn unbench(
        &mut self,
        identity: &str,
        connection: Arc<C>,
    ) -> Result<&Participant<C>, SessionError> {
        let index = self
            .benched
            .iter()
            .position(|p| p.identity() == identity)
            .ok_or_else(|| SessionError::ParticipantNotFound(identity.to_owned()))?;

        let mut participant = self.benched.remove(index);
        participant.rebind(connection);
        tracing::info!(
            session = %self.name,
            participant = identity,
            score = participant.score(),
            connection = %participant.connection_id(),
            "participant resumed"
        );
        self.active.push(participant);
        Ok(&self.active[self.active.len() - 1])
    }

    // -- Scoring ----------------------------------------------------------

    /// Adds `points` (possibly zero or negative) to the active participant
    /// on `connection` and returns the new total.
    ///
    /// This is the only way a score changes.
    ///
    /// # Errors
    /// [`SessionError::ParticipantNotFound`] if no active participant owns
    /// the connection.
    pub fn record_score(
        &mut self,
        connection: ConnectionId,
        points: i64,
    ) -> Result<i64, SessionError> {
        let participant = self
            .active
            .iter_mut()
            .find(|p| p.connection_id() == connection)
            .ok_or_else(|| SessionError::ParticipantNotFound(connection.to_string()))?;

        Ok(credit(&self.name, participant, points))
    }

    /// Zeroes every active participant's score.
    pub fn reset_scores(&mut self) {
        for participant in &mut self.active {
            let owed = participant.score();
            credit(&self.name, participant, -owed);
        }
    }

    // -- Questions --------------------------------------------------------

    /// Replaces the current question; nobody has answered the new one yet.
    pub fn install_question(
        &mut self,
        prompt: impl Into<String>,
        answer: Answer,
        choices: Vec<String>,
        weight: i64,
    ) -> &Question {
        let question = Question::new(prompt, answer, choices, weight);
        tracing::info!(
            session = %self.name,
            question = question.prompt(),
            weight,
            "question installed"
        );
        self.question.insert(question)
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Records that the participant on `connection` answered the current
    /// question and returns the updated response count.
    ///
    /// # Errors
    /// - [`SessionError::NoQuestion`] before any question was installed
    /// - [`SessionError::ParticipantNotFound`] for a connection that is not
    ///   active
    /// - [`SessionError::AlreadyResponded`] on a second answer
    pub fn record_response(
        &mut self,
        connection: ConnectionId,
    ) -> Result<usize, SessionError> {
        let identity = self.participant_by_connection(connection)?.identity().to_owned();
        let question = self.question.as_mut().ok_or(SessionError::NoQuestion)?;
        if question.has_responded(connection) {
            return Err(SessionError::AlreadyResponded(identity));
        }
        question.add_responder(connection);
        Ok(self.response_count())
    }

    /// How many currently active participants have answered.
    ///
    /// Responders who were benched since answering no longer count, so
    /// this never exceeds the size of the active pool.
    pub fn response_count(&self) -> usize {
        let Some(question) = &self.question else {
            return 0;
        };
        self.active
            .iter()
            .filter(|p| question.responders().contains(&p.connection_id()))
            .count()
    }

    /// `true` when there is at least one active participant and all of
    /// them have answered.
    pub fn all_responded(&self) -> bool {
        !self.active.is_empty() && self.response_count() == self.active.len()
    }

    // -- Lookup -----------------------------------------------------------

    /// The active participant named `identity`.
    pub fn participant(&self, identity: &str) -> Result<&Participant<C>, SessionError> {
        self.active
            .iter()
            .find(|p| p.identity() == identity)
            .ok_or_else(|| SessionError::ParticipantNotFound(identity.to_owned()))
    }

    /// The active participant on `connection`.
    pub fn participant_by_connection(
        &self,
        connection: ConnectionId,
    ) -> Result<&Participant<C>, SessionError> {
        self.active
            .iter()
            .find(|p| p.connection_id() == connection)
            .ok_or_else(|| SessionError::ParticipantNotFound(connection.to_string()))
    }

    pub fn benched_participant(&self, identity: &str) -> Option<&Participant<C>> {
        self.benched.iter().find(|p| p.identity() == identity)
    }
}

impl<C> Session<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Active participants in join order.
    pub fn active(&self) -> &[Participant<C>] {
        &self.active
    }

    pub fn benched(&self) -> &[Participant<C>] {
        &self.benched
    }

    /// The active pool as browsers see it.
    pub fn active_views(&self) -> Vec<PlayerView> {
        self.active.iter().map(Participant::view).collect()
    }

    /// Active participants by score, highest first; ties keep join order.
    pub fn scoreboard(&self) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .active
            .iter()
            .map(|p| ScoreEntry {
                name: p.identity().to_owned(),
                score: p.score(),
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries
    }

    /// Snapshot of everyone a broadcast should reach.
    pub fn recipients(&self) -> Vec<Recipient<C>> {
        self.active.iter().map(Recipient::from).collect()
    }
}

/// Applies `points` to one participant. Every score change goes through
/// here.
fn credit<C>(session: &str, participant: &mut Participant<C>, points: i64) -> i64 {
    let total = participant.add_points(points);
    tracing::debug!(
        session = %session,
        participant = participant.identity(),
        points,
        total,
        "score recorded"
    );
    total
}

impl<C> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("active", &self.active)
            .field("benched", &self.benched)
            .field("question", &self.question)
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
