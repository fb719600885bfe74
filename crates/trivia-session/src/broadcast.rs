//! Best-effort fan-out of server events to a session's participants.
//!
//! An event is serialized once. The same bytes are then written to every
//! recipient from its own task, so a slow or dead connection neither
//! delays nor aborts delivery to the others. Each write is bounded by the
//! send timeout; a write that overruns it is abandoned and reported as
//! failed. Nothing is retried and there is no ordering guarantee across
//! recipients.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use trivia_protocol::{Codec, JsonCodec};
use trivia_transport::{Connection, ConnectionId};

use crate::{BroadcastError, Participant, SessionHandle};

/// A delivery target, detached from the session so the lock can be
/// released before any bytes are written.
pub struct Recipient<C> {
    pub id: ConnectionId,
    pub name: String,
    pub connection: Arc<C>,
}

impl<C> Clone for Recipient<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            connection: Arc::clone(&self.connection),
        }
    }
}

impl<C> From<&Participant<C>> for Recipient<C> {
    fn from(participant: &Participant<C>) -> Self {
        Self {
            id: participant.connection_id(),
            name: participant.identity().to_owned(),
            connection: Arc::clone(participant.connection()),
        }
    }
}

/// Tally of one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients whose write succeeded.
    pub delivered: usize,
    /// Recipients whose write failed, in id order.
    pub failed: Vec<ConnectionId>,
}

impl DeliveryReport {
    /// `true` when nobody was missed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send timeout used unless [`Broadcaster::with_send_timeout`] says
/// otherwise.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

type Outcome = (ConnectionId, String, Result<(), String>);

/// Serializes events and delivers them.
#[derive(Debug, Clone)]
pub struct Broadcaster<K = JsonCodec> {
    codec: K,
    send_timeout: Duration,
}

impl<K: Codec + Default> Default for Broadcaster<K> {
    fn default() -> Self {
        Self::new(K::default())
    }
}

impl<K: Codec> Broadcaster<K> {
    pub fn new(codec: K) -> Self {
        Self {
            codec,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bounds every single write (and close) by `timeout`.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn codec(&self) -> &K {
        &self.codec
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Delivers `event` to every recipient concurrently.
    ///
    /// Per-recipient failures are logged and listed in the report; they
    /// never fail the call.
    ///
    /// # Errors
    /// [`BroadcastError::Encode`] if the event cannot be serialized, in
    /// which case nothing was sent.
    pub async fn publish<C, T>(
        &self,
        recipients: Vec<Recipient<C>>,
        event: &T,
    ) -> Result<DeliveryReport, BroadcastError>
    where
        C: Connection,
        T: Serialize,
    {
        let bytes: Arc<[u8]> = self.codec.encode(event)?.into();

        let limit = self.send_timeout;
        let mut deliveries = JoinSet::new();
        for recipient in recipients {
            let bytes = Arc::clone(&bytes);
            deliveries.spawn(async move {
                let outcome = bounded(limit, recipient.connection.send(&bytes)).await;
                (recipient.id, recipient.name, outcome)
            });
        }

        let report = settle(deliveries, "delivery").await;
        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "event published"
        );
        Ok(report)
    }

    /// Closes every recipient's connection concurrently, each bounded by
    /// the send timeout. `delivered` counts the connections that closed
    /// cleanly.
    pub async fn hang_up<C: Connection>(&self, recipients: Vec<Recipient<C>>) -> DeliveryReport {
        let limit = self.send_timeout;
        let mut closes = JoinSet::new();
        for recipient in recipients {
            closes.spawn(async move {
                let outcome = bounded(limit, recipient.connection.close()).await;
                (recipient.id, recipient.name, outcome)
            });
        }
        settle(closes, "close").await
    }

    /// Publishes to the active pool of `session`.
    ///
    /// The session lock is held only long enough to snapshot recipients.
    pub async fn publish_session<C, T>(
        &self,
        session: &SessionHandle<C>,
        event: &T,
    ) -> Result<DeliveryReport, BroadcastError>
    where
        C: Connection,
        T: Serialize,
    {
        let recipients = session.lock().await.recipients();
        self.publish(recipients, event).await
    }

    /// Sends `event` to a single connection.
    ///
    /// # Errors
    /// - [`BroadcastError::Encode`] if the event cannot be serialized
    /// - [`BroadcastError::Delivery`] if the write fails
    pub async fn notify<C, T>(&self, connection: &C, event: &T) -> Result<(), BroadcastError>
    where
        C: Connection,
        T: Serialize,
    {
        let bytes = self.codec.encode(event)?;
        bounded(self.send_timeout, connection.send(&bytes))
            .await
            .map_err(|reason| BroadcastError::Delivery {
                connection: connection.id(),
                reason,
            })
    }
}

/// Runs one connection operation under `limit`, flattening both failure
/// modes into a reason string.
async fn bounded<F, E>(limit: Duration, operation: F) -> Result<(), String>
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {limit:?}")),
    }
}

/// Drains a set of per-recipient tasks into a report.
async fn settle(mut tasks: JoinSet<Outcome>, action: &str) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, _, Ok(()))) => report.delivered += 1,
            Ok((id, name, Err(reason))) => {
                tracing::warn!(
                    connection = %id,
                    participant = %name,
                    %reason,
                    "{action} failed"
                );
                report.failed.push(id);
            }
            Err(e) => tracing::warn!(error = %e, "{action} task did not finish"),
        }
    }
    report.failed.sort();
    report
}

#[cfg(test)]
mod tests {
    use trivia_protocol::ServerMessage;

    use super::*;
    use crate::test_support::MockConnection;
    use crate::{AccessToken, Session};

    fn recipient(conn: &Arc<MockConnection>, name: &str) -> Recipient<MockConnection> {
        Recipient {
            id: conn.id(),
            name: name.to_owned(),
            connection: Arc::clone(conn),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_recipient() {
        let a = MockConnection::new(1);
        let b = MockConnection::new(2);
        let broadcaster = Broadcaster::<JsonCodec>::default();
        let event = ServerMessage::NotifyAll("hello".into());

        let report = broadcaster
            .publish(vec![recipient(&a, "a"), recipient(&b, "b")], &event)
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert!(report.is_complete());
        assert_eq!(a.messages(), vec![event.clone()]);
        assert_eq!(b.messages(), vec![event]);
    }

    #[tokio::test]
    async fn test_publish_one_broken_connection_does_not_stop_others() {
        let a = MockConnection::new(1);
        let b = MockConnection::new(2);
        let c = MockConnection::new(3);
        b.break_link();
        let broadcaster = Broadcaster::<JsonCodec>::default();
        let event = ServerMessage::NotifyAll("round two".into());

        let report = broadcaster
            .publish(
                vec![recipient(&a, "a"), recipient(&b, "b"), recipient(&c, "c")],
                &event,
            )
            .await
            .expect("a delivery failure must not fail the publish");

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![ConnectionId::new(2)]);
        assert_eq!(a.messages(), vec![event.clone()]);
        assert_eq!(c.messages(), vec![event]);
        assert!(b.messages().is_empty());
    }

    #[tokio::test]
    async fn test_publish_stalled_recipient_times_out_without_blocking_others() {
        let healthy = MockConnection::new(1);
        let stuck = MockConnection::new(2);
        stuck.stall();
        let broadcaster = Broadcaster::<JsonCodec>::default()
            .with_send_timeout(Duration::from_millis(50));
        let event = ServerMessage::NotifyAll("still there?".into());

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            broadcaster.publish(
                vec![recipient(&healthy, "healthy"), recipient(&stuck, "stuck")],
                &event,
            ),
        )
        .await
        .expect("a stalled peer must not hold up the caller")
        .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![ConnectionId::new(2)]);
        assert_eq!(healthy.messages(), vec![event]);
    }

    #[tokio::test]
    async fn test_notify_stalled_connection_returns_delivery_error() {
        let stuck = MockConnection::new(5);
        stuck.stall();
        let broadcaster = Broadcaster::<JsonCodec>::default()
            .with_send_timeout(Duration::from_millis(50));

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            broadcaster.notify(stuck.as_ref(), &ServerMessage::Logout),
        )
        .await
        .expect("notify must give up after the send timeout");

        assert!(matches!(result, Err(BroadcastError::Delivery { .. })));
    }

    #[tokio::test]
    async fn test_hang_up_closes_every_recipient_and_reports_stalls() {
        let a = MockConnection::new(1);
        let b = MockConnection::new(2);
        b.stall();
        let broadcaster = Broadcaster::<JsonCodec>::default()
            .with_send_timeout(Duration::from_millis(50));

        let report = broadcaster
            .hang_up(vec![recipient(&a, "a"), recipient(&b, "b")])
            .await;

        assert!(a.is_closed());
        assert!(!b.is_closed());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![ConnectionId::new(2)]);
    }

    #[test]
    fn test_default_uses_default_send_timeout() {
        assert_eq!(
            Broadcaster::<JsonCodec>::default().send_timeout(),
            DEFAULT_SEND_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_publish_no_recipients_is_empty_report() {
        let broadcaster = Broadcaster::<JsonCodec>::default();
        let report = broadcaster
            .publish::<MockConnection, _>(Vec::new(), &ServerMessage::Logout)
            .await
            .unwrap();
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_publish_session_skips_benched_participants() {
        let mut session = Session::with_token("s", AccessToken::new("k", 60.0));
        let a = MockConnection::new(1);
        let b = MockConnection::new(2);
        session.login("a", Arc::clone(&a), "").unwrap();
        session.login("b", Arc::clone(&b), "").unwrap();
        session.bench(b.id()).unwrap();
        let handle: SessionHandle<MockConnection> =
            Arc::new(tokio::sync::Mutex::new(session));

        let report = Broadcaster::<JsonCodec>::default()
            .publish_session(&handle, &ServerMessage::NotifyAll("x".into()))
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(a.messages().len(), 1);
        assert!(b.messages().is_empty());
    }

    #[tokio::test]
    async fn test_notify_single_target() {
        let a = MockConnection::new(1);
        let broadcaster = Broadcaster::<JsonCodec>::default();

        broadcaster
            .notify(a.as_ref(), &ServerMessage::PlayerMessage(true))
            .await
            .unwrap();

        assert_eq!(a.messages(), vec![ServerMessage::PlayerMessage(true)]);
    }

    #[tokio::test]
    async fn test_notify_broken_connection_returns_delivery_error() {
        let a = MockConnection::new(4);
        a.break_link();

        let result = Broadcaster::<JsonCodec>::default()
            .notify(a.as_ref(), &ServerMessage::Logout)
            .await;

        assert!(matches!(
            result,
            Err(BroadcastError::Delivery { connection, .. }) if connection == ConnectionId::new(4)
        ));
    }
}
