//! Administrative operations: what the quiz master can do to a session.
//!
//! Every operation takes the session's access token first. The token is
//! checked for equality only, so a quiz master can keep running a game
//! after new logins have been shut out by expiry.

use std::str::FromStr;
use std::sync::Arc;

use trivia_protocol::{AnswerBitmap, MAX_CHOICES, ProtocolError, ScoreEntry, ServerMessage};
use trivia_session::{Answer, DeliveryReport, Recipient, SessionHandle};
use trivia_transport::Connection;

use crate::TriviaError;
use crate::server::ServerState;

/// A question as submitted by the quiz master.
///
/// The text form is `prompt|weight|answers[|choice...]`:
///
/// ```text
/// Capital of France?|1|Paris
/// Primary colours?|5|1,3|red|green|blue
/// ```
///
/// With choices, `answers` is a comma list of one-based choice indices;
/// without, it is the literal answer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub prompt: String,
    pub weight: i64,
    pub answer: Answer,
    pub choices: Vec<String>,
}

impl FromStr for QuestionRecord {
    type Err = ProtocolError;

    /// Parses the pipe-delimited form.
    ///
    /// Answer indices that are not numbers are skipped with a warning.
    /// Indices past the end of the choice list (or above
    /// [`MAX_CHOICES`]) are rejected, and at least one must remain.
    fn from_str(record: &str) -> Result<Self, Self::Err> {
        let mut fields = record.trim_end_matches(['\r', '\n']).split('|');

        let prompt = fields
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("question record has no prompt"))?
            .to_owned();
        let raw_weight = fields
            .next()
            .ok_or_else(|| invalid("question record has no weight"))?
            .trim();
        let weight = raw_weight
            .parse::<i64>()
            .map_err(|_| invalid(&format!("weight `{raw_weight}` is not an integer")))?;
        let answers = fields
            .next()
            .ok_or_else(|| invalid("question record has no answer"))?
            .trim();
        let choices: Vec<String> = fields.map(|c| c.trim().to_owned()).collect();

        let answer = if choices.is_empty() {
            if answers.is_empty() {
                return Err(ProtocolError::EmptyAnswer);
            }
            Answer::Single(answers.to_owned())
        } else {
            let mut indices = Vec::new();
            for entry in answers.split(',').map(str::trim) {
                match entry.parse::<u32>() {
                    Ok(index) if index == 0 || index as usize > choices.len() => {
                        return Err(ProtocolError::ChoiceOutOfRange(index));
                    }
                    Ok(index) => indices.push(index),
                    Err(_) => tracing::warn!(entry, "skipping answer index that is not a number"),
                }
            }
            Answer::Bitmap(AnswerBitmap::encode(indices)?)
        };

        if choices.len() > MAX_CHOICES as usize {
            tracing::warn!(
                choices = choices.len(),
                "choices past {MAX_CHOICES} can never be marked correct"
            );
        }

        Ok(Self {
            prompt,
            weight,
            answer,
            choices,
        })
    }
}

fn invalid(reason: &str) -> ProtocolError {
    ProtocolError::InvalidMessage(reason.to_owned())
}

impl<C: Connection> ServerState<C> {
    /// Logs `name` out: benches the participant, sends `logout` to their
    /// connection and closes it, then publishes the new scoreboard.
    ///
    /// Closing the connection ends its read loop, so the same socket cannot
    /// log straight back in.
    pub async fn kill(&self, token: &str, name: &str) -> Result<DeliveryReport, TriviaError> {
        let handle = self.registry.resolve(token).await?;

        let (target, views, recipients) = {
            let mut session = handle.lock().await;
            let target = Recipient::from(session.participant(name)?);
            session.bench(target.id)?;
            (target, session.active_views(), session.recipients())
        };
        tracing::info!(participant = name, "participant killed");

        if let Err(e) = self
            .broadcaster
            .notify(target.connection.as_ref(), &ServerMessage::Logout)
            .await
        {
            tracing::warn!(participant = name, error = %e, "logout not delivered");
        }
        self.broadcaster.hang_up(vec![target]).await;

        Ok(self
            .broadcaster
            .publish(recipients, &ServerMessage::UpdateScoreboard(views))
            .await?)
    }

    /// Sends `text` to one active participant.
    pub async fn message(&self, token: &str, name: &str, text: &str) -> Result<(), TriviaError> {
        let handle = self.registry.resolve(token).await?;
        let connection = Arc::clone(handle.lock().await.participant(name)?.connection());

        self.broadcaster
            .notify(connection.as_ref(), &ServerMessage::NotifyPlayer(text.to_owned()))
            .await?;
        Ok(())
    }

    /// Sends `text` to every active participant.
    pub async fn notify_all(&self, token: &str, text: &str) -> Result<DeliveryReport, TriviaError> {
        let handle = self.registry.resolve(token).await?;
        self.publish(&handle, &ServerMessage::NotifyAll(text.to_owned()))
            .await
    }

    /// Parses a [`QuestionRecord`], installs it, and pushes it to
    /// everyone.
    ///
    /// The record is parsed before the token is checked against a
    /// session, so a malformed record never touches session state.
    pub async fn install_question(
        &self,
        token: &str,
        record: &str,
    ) -> Result<DeliveryReport, TriviaError> {
        let record: QuestionRecord = record.parse()?;
        let handle = self.registry.resolve(token).await?;

        let (view, recipients) = {
            let mut session = handle.lock().await;
            let view = session
                .install_question(record.prompt, record.answer, record.choices, record.weight)
                .view();
            (view, session.recipients())
        };

        Ok(self
            .broadcaster
            .publish(recipients, &ServerMessage::Question(view))
            .await?)
    }

    /// Zeroes every active participant's score and publishes the board.
    pub async fn reset_scores(&self, token: &str) -> Result<DeliveryReport, TriviaError> {
        let handle = self.registry.resolve(token).await?;

        let (views, recipients) = {
            let mut session = handle.lock().await;
            session.reset_scores();
            (session.active_views(), session.recipients())
        };
        tracing::info!("scores reset");

        Ok(self
            .broadcaster
            .publish(recipients, &ServerMessage::UpdateScoreboard(views))
            .await?)
    }

    /// Active participants by score, highest first.
    pub async fn scoreboard(&self, token: &str) -> Result<Vec<ScoreEntry>, TriviaError> {
        let handle = self.registry.resolve(token).await?;
        let scoreboard = handle.lock().await.scoreboard();
        Ok(scoreboard)
    }

    /// Adds `delta` to `name`'s score, publishes the board, and returns
    /// the new total.
    pub async fn adjust_score(&self, token: &str, name: &str, delta: i64) -> Result<i64, TriviaError> {
        let handle = self.registry.resolve(token).await?;

        let (total, views, recipients) = {
            let mut session = handle.lock().await;
            let connection = session.participant(name)?.connection_id();
            let total = session.record_score(connection, delta)?;
            (total, session.active_views(), session.recipients())
        };
        tracing::info!(participant = name, delta, total, "score adjusted");

        self.broadcaster
            .publish(recipients, &ServerMessage::UpdateScoreboard(views))
            .await?;
        Ok(total)
    }

    /// Removes the session, then sends `logout` to everyone who was active
    /// and closes their connections.
    ///
    /// The session leaves the registry first, so nobody can log back in
    /// while the goodbyes are in flight.
    pub async fn close_session(&self, token: &str) -> Result<DeliveryReport, TriviaError> {
        let handle = self.registry.resolve(token).await?;
        let recipients = handle.lock().await.recipients();
        self.registry.remove(token).await;

        let report = self
            .broadcaster
            .publish(recipients.clone(), &ServerMessage::Logout)
            .await?;
        self.broadcaster.hang_up(recipients).await;
        Ok(report)
    }

    async fn publish(
        &self,
        handle: &SessionHandle<C>,
        event: &ServerMessage,
    ) -> Result<DeliveryReport, TriviaError> {
        Ok(self.broadcaster.publish_session(handle, event).await?)
    }
}

#[cfg(test)]
mod tests {
    use trivia_session::{AccessToken, Session, SessionConfig, SessionError};

    use super::*;
    use crate::ErrorKind;
    use crate::test_support::MockConnection;

    const TOKEN: &str = "k3y";

    async fn state_with_players(
        names: &[&str],
    ) -> (ServerState<MockConnection>, Vec<Arc<MockConnection>>) {
        let state = ServerState::new(SessionConfig::default());
        let handle = state
            .registry
            .register(Session::with_token("quiz", AccessToken::new(TOKEN, 3600.0)))
            .await;
        let mut conns = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let conn = MockConnection::new(i as u64 + 1);
            handle.lock().await.login(name, Arc::clone(&conn), "").unwrap();
            conns.push(conn);
        }
        (state, conns)
    }

    // =====================================================================
    // QuestionRecord
    // =====================================================================

    #[test]
    fn test_question_record_single_answer() {
        let record: QuestionRecord = "Capital of France?|1|Paris".parse().unwrap();
        assert_eq!(record.prompt, "Capital of France?");
        assert_eq!(record.weight, 1);
        assert_eq!(record.answer, Answer::Single("Paris".into()));
        assert!(record.choices.is_empty());
    }

    #[test]
    fn test_question_record_multiple_choice_encodes_bitmap() {
        let record: QuestionRecord =
            "Primary colours?|5|1,3|red|green|blue".parse().unwrap();
        assert_eq!(
            record.answer,
            Answer::Bitmap(AnswerBitmap::encode([1, 3]).unwrap())
        );
        assert_eq!(record.choices, vec!["red", "green", "blue"]);
    }

    #[test]
    fn test_question_record_skips_unparseable_indices() {
        let record: QuestionRecord = "Pick|2|x, 2 ,?|a|b".parse().unwrap();
        assert_eq!(
            record.answer,
            Answer::Bitmap(AnswerBitmap::encode([2]).unwrap())
        );
    }

    #[test]
    fn test_question_record_index_past_choices_is_rejected() {
        let result = "Pick|2|3|a|b".parse::<QuestionRecord>();
        assert!(matches!(result, Err(ProtocolError::ChoiceOutOfRange(3))));
    }

    #[test]
    fn test_question_record_no_valid_index_is_rejected() {
        let result = "Pick|2|x|a|b".parse::<QuestionRecord>();
        assert!(matches!(result, Err(ProtocolError::EmptyAnswer)));
    }

    #[test]
    fn test_question_record_bad_weight_is_rejected() {
        let result = "Pick|heavy|1|a".parse::<QuestionRecord>();
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_question_record_missing_fields_are_rejected() {
        assert!("".parse::<QuestionRecord>().is_err());
        assert!("Prompt".parse::<QuestionRecord>().is_err());
        assert!("Prompt|1".parse::<QuestionRecord>().is_err());
        assert!("Prompt|1|".parse::<QuestionRecord>().is_err());
    }

    // =====================================================================
    // Operations
    // =====================================================================

    #[tokio::test]
    async fn test_install_question_publishes_to_everyone() {
        let (state, conns) = state_with_players(&["alice", "bob"]).await;

        let report = state
            .install_question(TOKEN, "Primary colours?|5|1,3|red|green|blue")
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        for conn in &conns {
            match conn.messages().as_slice() {
                [ServerMessage::Question(view)] => {
                    assert_eq!(view.question, "Primary colours?");
                    assert_eq!(view.answer.map(u16::from), Some(32773));
                }
                other => panic!("expected one question, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_install_question_unknown_or_empty_token_fails() {
        let (state, conns) = state_with_players(&["alice"]).await;

        let err = state.install_question("nope", "Q|1|a").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(conns[0].messages().is_empty());

        let err = state.install_question("", "Q|1|a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_kill_logs_out_and_benches() {
        let (state, conns) = state_with_players(&["alice", "bob"]).await;

        state.kill(TOKEN, "alice").await.unwrap();

        let alice_got = conns[0].messages();
        assert_eq!(alice_got, vec![ServerMessage::Logout]);
        match conns[1].messages().as_slice() {
            [ServerMessage::UpdateScoreboard(views)] => {
                assert_eq!(views.len(), 1);
                assert_eq!(views[0].name, "bob");
            }
            other => panic!("expected scoreboard, got {other:?}"),
        }
        let handle = state.registry.resolve(TOKEN).await.unwrap();
        assert!(handle.lock().await.benched_participant("alice").is_some());
    }

    #[tokio::test]
    async fn test_kill_unknown_name_is_lookup_error() {
        let (state, _conns) = state_with_players(&["alice"]).await;
        let err = state.kill(TOKEN, "mallory").await.unwrap_err();
        assert!(matches!(
            err,
            TriviaError::Session(SessionError::ParticipantNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_message_reaches_only_named_participant() {
        let (state, conns) = state_with_players(&["alice", "bob"]).await;

        state.message(TOKEN, "bob", "psst").await.unwrap();

        assert!(conns[0].messages().is_empty());
        assert_eq!(
            conns[1].messages(),
            vec![ServerMessage::NotifyPlayer("psst".into())]
        );
    }

    #[tokio::test]
    async fn test_notify_all_reaches_everyone() {
        let (state, conns) = state_with_players(&["alice", "bob"]).await;

        let report = state.notify_all(TOKEN, "round two").await.unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(
            conns[0].messages(),
            vec![ServerMessage::NotifyAll("round two".into())]
        );
    }

    #[tokio::test]
    async fn test_adjust_score_then_reset() {
        let (state, _conns) = state_with_players(&["alice", "bob"]).await;

        assert_eq!(state.adjust_score(TOKEN, "bob", 4).await.unwrap(), 4);
        assert_eq!(state.adjust_score(TOKEN, "alice", -2).await.unwrap(), -2);
        let board = state.scoreboard(TOKEN).await.unwrap();
        assert_eq!(board[0].name, "bob");
        assert_eq!(board[1].score, -2);

        state.reset_scores(TOKEN).await.unwrap();

        let board = state.scoreboard(TOKEN).await.unwrap();
        assert!(board.iter().all(|e| e.score == 0));
    }

    #[tokio::test]
    async fn test_close_session_logs_out_and_removes() {
        let (state, conns) = state_with_players(&["alice"]).await;

        state.close_session(TOKEN).await.unwrap();

        assert_eq!(conns[0].messages(), vec![ServerMessage::Logout]);
        assert!(state.registry.is_empty().await);
        assert!(state.scoreboard(TOKEN).await.is_err());
    }

    // =====================================================================
    // Connections are closed after logout
    // =====================================================================

    /// Shared state with an empty session and one read loop per name,
    /// each logged in through its own connection.
    async fn state_with_live_players(
        names: &[&str],
    ) -> (
        Arc<ServerState<MockConnection>>,
        Vec<(Arc<MockConnection>, tokio::task::JoinHandle<()>)>,
    ) {
        let state = Arc::new(ServerState::new(SessionConfig::default()));
        state
            .registry
            .register(Session::with_token("quiz", AccessToken::new(TOKEN, 3600.0)))
            .await;
        let mut players = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let conn = MockConnection::new(i as u64 + 1);
            let task = tokio::spawn(crate::handler::handle_connection(
                Arc::clone(&conn),
                String::new(),
                Arc::clone(&state),
            ));
            conn.push(&format!(
                r#"{{"type":"login","username":"{name}","token":"{TOKEN}"}}"#
            ));
            conn.wait_for(1).await;
            players.push((conn, task));
        }
        (state, players)
    }

    #[tokio::test]
    async fn test_kill_closes_connection_and_ends_read_loop() {
        let (state, mut players) = state_with_live_players(&["alice"]).await;
        let (alice, task) = players.remove(0);

        state.kill(TOKEN, "alice").await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("read loop should end once the connection is closed")
            .unwrap();
        assert_eq!(alice.messages().last(), Some(&ServerMessage::Logout));

        // The socket is gone, so the frame never reaches a read loop.
        alice.push(&format!(
            r#"{{"type":"login","username":"alice","token":"{TOKEN}"}}"#
        ));
        let handle = state.registry.resolve(TOKEN).await.unwrap();
        let session = handle.lock().await;
        assert!(session.active().is_empty());
        assert!(session.benched_participant("alice").is_some());
    }

    #[tokio::test]
    async fn test_close_session_closes_every_connection() {
        let (state, players) = state_with_live_players(&["alice", "bob"]).await;

        let report = state.close_session(TOKEN).await.unwrap();

        assert_eq!(report.delivered, 2);
        for (conn, task) in players {
            tokio::time::timeout(std::time::Duration::from_secs(2), task)
                .await
                .expect("read loop should end once the connection is closed")
                .unwrap();
            assert_eq!(conn.messages().last(), Some(&ServerMessage::Logout));
        }
        assert!(state.registry.is_empty().await);
    }
}
