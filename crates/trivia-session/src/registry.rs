//! The registry: every open session, keyed by its access token.
//!
//! All external collaborators (realtime read loops, admin requests) find
//! their session here. The registry owns session lifetime; a session lives
//! until it is removed explicitly or swept after expiring.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use trivia_transport::{Connection, ConnectionId};

use crate::{Session, SessionError, SessionHandle};

/// Maps token values to sessions.
pub struct SessionRegistry<C> {
    sessions: RwLock<HashMap<String, SessionHandle<C>>>,
}

impl<C: Connection> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a session under its token value and returns its handle.
    ///
    /// A session already registered under the same value is replaced.
    pub async fn register(&self, session: Session<C>) -> SessionHandle<C> {
        let key = session.token().value().to_owned();
        let name = session.name().to_owned();
        let handle = Arc::new(Mutex::new(session));

        let previous = self
            .sessions
            .write()
            .await
            .insert(key, Arc::clone(&handle));
        if previous.is_some() {
            tracing::warn!(session = %name, "token collision, previous session replaced");
        }
        tracing::info!(session = %name, "session registered");
        handle
    }

    /// Finds the session for `token`.
    ///
    /// Only the token's value is checked; expiry is a login concern.
    ///
    /// # Errors
    /// - [`SessionError::EmptyToken`] for an empty token
    /// - [`SessionError::SessionNotFound`] when nothing is registered
    /// - [`SessionError::BadToken`] when the stored token disagrees
    pub async fn resolve(&self, token: &str) -> Result<SessionHandle<C>, SessionError> {
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        let handle = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(SessionError::SessionNotFound)?;

        handle.lock().await.token().verify(token)?;
        Ok(handle)
    }

    /// Finds the session whose active pool holds `connection`.
    ///
    /// Returns the participant's identity alongside the handle. Used when a
    /// connection drops, since that path has no token to go on.
    ///
    /// # Errors
    /// [`SessionError::ParticipantNotFound`] if no session has the
    /// connection in its active pool.
    pub async fn resolve_by_connection(
        &self,
        connection: ConnectionId,
    ) -> Result<(String, SessionHandle<C>), SessionError> {
        let sessions = self.sessions.read().await;
        for handle in sessions.values() {
            let session = handle.lock().await;
            if let Ok(participant) = session.participant_by_connection(connection) {
                return Ok((participant.identity().to_owned(), Arc::clone(handle)));
            }
        }
        Err(SessionError::ParticipantNotFound(connection.to_string()))
    }

    /// Drops the session registered under `token`.
    pub async fn remove(&self, token: &str) -> Option<SessionHandle<C>> {
        let removed = self.sessions.write().await.remove(token);
        if let Some(handle) = &removed {
            let name = handle.lock().await.name().to_owned();
            tracing::info!(session = %name, "session removed");
        }
        removed
    }

    /// Removes every session whose token has lapsed at `now` and that has
    /// no participants at all, active or benched. A benched participant can
    /// still resume, so their session is kept. Returns the removed
    /// sessions' names.
    pub async fn sweep_expired(&self, now: Instant) -> Vec<String> {
        let mut sessions = self.sessions.write().await;

        let mut doomed = Vec::new();
        for (key, handle) in sessions.iter() {
            let session = handle.lock().await;
            if session.token().has_lapsed_at(now)
                && session.active().is_empty()
                && session.benched().is_empty()
            {
                doomed.push((key.clone(), session.name().to_owned()));
            }
        }

        doomed
            .into_iter()
            .map(|(key, name)| {
                sessions.remove(&key);
                tracing::info!(session = %name, "expired session swept");
                name
            })
            .collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl<C: Connection> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
