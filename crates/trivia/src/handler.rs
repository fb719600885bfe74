//! Per-connection read loop: login, guesses, and disconnect.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Loop: receive a frame → decode → resolve the session by token →
//!      dispatch `login` or `guess`
//!   2. A failure on one message is reported back as an `error` event and
//!      the loop carries on
//!   3. On close or read error: bench the participant once and tell the
//!      others
//!
//! Session state is snapshotted under the session lock; every send happens
//! after the lock is released.

use std::sync::Arc;

use trivia_protocol::{
    ClientMessage, ClientMessageKind, Codec, GuessData, ProtocolError, ServerMessage,
};
use trivia_session::{LoginOutcome, SessionError, SessionHandle};
use trivia_transport::{Connection, ConnectionId};

use crate::TriviaError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(
    conn: Arc<C>,
    external_id: String,
    state: Arc<ServerState<C>>,
) {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, external_id = %external_id, "handling new connection");

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        if let Err(e) = dispatch(&conn, &external_id, &state, &data).await {
            tracing::warn!(%conn_id, error = %e, "message rejected");
            report_error(conn.as_ref(), &state, &e).await;
        }
    }

    disconnect(conn_id, &state).await;
}

/// Decodes one inbound frame and routes it.
async fn dispatch<C: Connection>(
    conn: &Arc<C>,
    external_id: &str,
    state: &ServerState<C>,
    data: &[u8],
) -> Result<(), TriviaError> {
    let msg: ClientMessage = state.broadcaster.codec().decode(data)?;
    let handle = state.registry.resolve(&msg.token).await?;

    match msg.kind {
        ClientMessageKind::Login => {
            login(conn, external_id, state, &handle, &msg.username).await
        }
        ClientMessageKind::Guess => {
            let guess = msg.data.ok_or_else(|| {
                ProtocolError::InvalidMessage("guess is missing its data".into())
            })?;
            guess_answer(conn, state, &handle, guess).await
        }
    }
}

async fn login<C: Connection>(
    conn: &Arc<C>,
    external_id: &str,
    state: &ServerState<C>,
    handle: &SessionHandle<C>,
    username: &str,
) -> Result<(), TriviaError> {
    let identity = username.trim();
    if identity.is_empty() {
        return Err(ProtocolError::InvalidMessage("username must not be empty".into()).into());
    }

    // A connection plays in at most one session. Within the same session
    // `Session::login` reports the conflict itself.
    if let Ok((playing_as, current)) = state.registry.resolve_by_connection(conn.id()).await {
        if !Arc::ptr_eq(&current, handle) {
            return Err(SessionError::AlreadyLoggedIn(playing_as).into());
        }
    }

    let (views, recipients) = {
        let mut session = handle.lock().await;
        let outcome = session.login(identity, Arc::clone(conn), external_id)?;
        if outcome == LoginOutcome::Resumed {
            tracing::info!(
                session = %session.name(),
                participant = identity,
                "participant logged back in"
            );
        }
        (session.active_views(), session.recipients())
    };

    state
        .broadcaster
        .publish(recipients, &ServerMessage::PlayerAdd(views))
        .await?;
    Ok(())
}

/// Scores a guess against the current question.
///
/// The guesser always hears the verdict; a wrong guess also hears the
/// correct answer. Once every active participant has answered, everyone
/// gets the updated scoreboard.
async fn guess_answer<C: Connection>(
    conn: &Arc<C>,
    state: &ServerState<C>,
    handle: &SessionHandle<C>,
    guess: GuessData,
) -> Result<(), TriviaError> {
    let conn_id = conn.id();

    let (correct, reveal, round_over) = {
        let mut session = handle.lock().await;
        session.record_response(conn_id)?;

        let question = session.question().ok_or(SessionError::NoQuestion)?;
        let correct = question.answer().accepts(&guess);
        let weight = question.weight();
        let reveal = question.reveal();
        let described = question.describe_guess(&guess);

        if correct {
            session.record_score(conn_id, weight)?;
        }
        let participant = session.participant_by_connection(conn_id)?;
        tracing::info!(
            session = %session.name(),
            participant = participant.identity(),
            guess = %described,
            correct,
            score = participant.score(),
            "guess scored"
        );

        let round_over = session.all_responded().then(|| {
            (session.active_views(), session.recipients(), session.scoreboard())
        });
        (correct, reveal, round_over)
    };

    send(conn.as_ref(), state, &ServerMessage::PlayerMessage(correct)).await;
    if !correct {
        let note = format!("The correct answer is {reveal}");
        send(conn.as_ref(), state, &ServerMessage::NotifyPlayer(note)).await;
    }

    if let Some((views, recipients, scoreboard)) = round_over {
        state
            .broadcaster
            .publish(recipients, &ServerMessage::UpdateScoreboard(views))
            .await?;
        tracing::info!(?scoreboard, "everyone has answered");
    }
    Ok(())
}

/// Benches whoever was playing on `conn_id` and tells the rest.
async fn disconnect<C: Connection>(conn_id: ConnectionId, state: &ServerState<C>) {
    let Ok((identity, handle)) = state.registry.resolve_by_connection(conn_id).await else {
        tracing::debug!(%conn_id, "connection closed without an active participant");
        return;
    };

    let snapshot = {
        let mut session = handle.lock().await;
        match session.bench(conn_id) {
            Ok(_) => Some((session.active_views(), session.recipients())),
            Err(e) => {
                tracing::debug!(%conn_id, participant = %identity, error = %e, "already benched");
                None
            }
        }
    };

    if let Some((views, recipients)) = snapshot {
        if let Err(e) = state
            .broadcaster
            .publish(recipients, &ServerMessage::PlayerDelete(views))
            .await
        {
            tracing::warn!(%conn_id, error = %e, "could not announce departure");
        }
    }
}

/// Sends one event to one connection, logging instead of failing.
async fn send<C: Connection>(conn: &C, state: &ServerState<C>, event: &ServerMessage) {
    if let Err(e) = state.broadcaster.notify(conn, event).await {
        tracing::warn!(conn_id = %conn.id(), error = %e, "send failed");
    }
}

/// Tells the sender what went wrong with its message.
async fn report_error<C: Connection>(conn: &C, state: &ServerState<C>, error: &TriviaError) {
    send(conn, state, &ServerMessage::Error(error.to_string())).await;
}

// =========================================================================
// Tests
// =========================================================================
