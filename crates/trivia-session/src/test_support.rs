//! In-memory connection used by the unit tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use trivia_protocol::{Codec, JsonCodec, ServerMessage};
use trivia_transport::{Connection, ConnectionId, TransportError};

/// Records every frame sent to it; can be switched into a failing or a
/// never-completing state.
pub(crate) struct MockConnection {
    id: ConnectionId,
    sent: Mutex<Vec<Vec<u8>>>,
    broken: AtomicBool,
    stalled: AtomicBool,
    closed: AtomicBool,
}

impl MockConnection {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(id),
            sent: Mutex::new(Vec::new()),
            broken: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Makes every later `send` and `close` hang forever, like a peer that
    /// stopped reading.
    pub(crate) fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes every later `send` fail.
    pub(crate) fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Every frame sent so far, decoded.
    pub(crate) fn messages(&self) -> Vec<ServerMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| JsonCodec.decode(bytes).unwrap())
            .collect()
    }
}

impl Connection for MockConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed(self.id));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
