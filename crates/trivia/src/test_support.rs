//! In-memory connection for driving read loops in unit tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use trivia_protocol::{Codec, JsonCodec, ServerMessage};
use trivia_transport::{Connection, ConnectionId, TransportError};

/// Inbound frames come from a channel; outbound frames are recorded.
pub(crate) struct MockConnection {
    id: ConnectionId,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockConnection {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: ConnectionId::new(id),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Queues a frame as if the browser had sent it.
    pub(crate) fn push(&self, frame: &str) {
        if let Some(tx) = self.inbound_tx.lock().unwrap().as_ref() {
            tx.send(frame.as_bytes().to_vec()).unwrap();
        }
    }

    /// Closes the inbound side; the read loop sees a clean close.
    pub(crate) fn hang_up(&self) {
        self.inbound_tx.lock().unwrap().take();
    }

    pub(crate) fn messages(&self) -> Vec<ServerMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| JsonCodec.decode(bytes).unwrap())
            .collect()
    }

    /// Waits until at least `count` frames were sent, then returns them.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<ServerMessage> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "{} got {} of {count} frames: {messages:?}",
                self.id,
                messages.len()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Connection for MockConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.inbound_rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.hang_up();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
