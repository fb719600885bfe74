//! `TriviaServer` builder and server loop.
//!
//! This is the entry point for running a trivia coordinator. It ties the
//! layers together: transport → protocol → session, plus the admin HTTP
//! listener and the periodic sweep of expired sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use trivia_protocol::JsonCodec;
use trivia_session::{Broadcaster, Session, SessionConfig, SessionRegistry};
use trivia_transport::{
    Connection, Handshake, PendingWebSocket, Transport, WebSocketConnection, WebSocketTransport,
};

use crate::TriviaError;
use crate::handler::handle_connection;

/// Query parameter on the connect URL that carries the client's own id.
pub const EXTERNAL_ID_PARAM: &str = "uuid";

/// Shared server state passed to every read loop and admin request.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry does its own locking; each session has its own lock.
pub struct ServerState<C> {
    pub(crate) registry: SessionRegistry<C>,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) config: SessionConfig,
}

impl<C: Connection> ServerState<C> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            broadcaster: Broadcaster::new(JsonCodec).with_send_timeout(config.send_timeout()),
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry<C> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a new session and returns its access token.
    ///
    /// The token is the only way in, so hand it to whoever runs the game.
    pub async fn open_session(&self, name: &str) -> String {
        let session = Session::new(name, &self.config);
        let token = session.token().value().to_owned();
        self.registry.register(session).await;
        token
    }

    /// Drops every expired session nobody is playing in.
    pub async fn sweep(&self) -> Vec<String> {
        self.registry.sweep_expired(Instant::now()).await
    }
}

/// Builder for configuring and starting a trivia server.
///
/// # Example
///
/// ```rust,ignore
/// use trivia::prelude::*;
///
/// let server = TriviaServer::builder()
///     .bind("0.0.0.0:8080")
///     .admin_bind("127.0.0.1:8081")
///     .build()
///     .await?;
/// let token = server.open_session("quiz night").await;
/// server.run().await
/// ```
pub struct TriviaServerBuilder {
    bind_addr: String,
    admin_addr: Option<String>,
    session_config: SessionConfig,
}

impl TriviaServerBuilder {
    /// Creates a new builder with default settings and no admin listener.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            admin_addr: None,
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address the realtime WebSocket listener binds to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Enables the admin HTTP API on `addr`.
    pub fn admin_bind(mut self, addr: &str) -> Self {
        self.admin_addr = Some(addr.to_string());
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listeners.
    ///
    /// # Errors
    /// Fails if either address cannot be bound.
    pub async fn build(self) -> Result<TriviaServer, TriviaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let admin = match &self.admin_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        Ok(TriviaServer {
            transport,
            admin,
            state: Arc::new(ServerState::new(self.session_config)),
        })
    }
}

impl Default for TriviaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound trivia server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TriviaServer {
    transport: WebSocketTransport,
    admin: Option<TcpListener>,
    state: Arc<ServerState<WebSocketConnection>>,
}

impl TriviaServer {
    /// Creates a new builder.
    pub fn builder() -> TriviaServerBuilder {
        TriviaServerBuilder::new()
    }

    /// Returns the address the realtime listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the admin listener's address, if one was configured.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Shared state, for driving admin operations in-process.
    pub fn state(&self) -> Arc<ServerState<WebSocketConnection>> {
        Arc::clone(&self.state)
    }

    /// Opens a session; see [`ServerState::open_session`].
    pub async fn open_session(&self, name: &str) -> String {
        self.state.open_session(name).await
    }

    /// Runs the server.
    ///
    /// Starts the admin API and the expiry sweep in the background, then
    /// accepts sockets and spawns a task for each that performs the
    /// WebSocket upgrade and then runs the read loop. Runs until the process
    /// is terminated.
    pub async fn run(mut self) -> Result<(), TriviaError> {
        if let Some(listener) = self.admin.take() {
            let app = crate::http::router(Arc::clone(&self.state));
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "admin API stopped");
                }
            });
        }

        if let Some(period) = self.state.config.sweep_interval() {
            tokio::spawn(sweep_loop(Arc::clone(&self.state), period));
        }

        tracing::info!(addr = ?self.transport.local_addr().ok(), "trivia server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    tokio::spawn(upgrade_and_serve(pending, Arc::clone(&self.state)));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Completes the upgrade under the configured deadline, then hands the
/// connection to its read loop.
async fn upgrade_and_serve(
    pending: PendingWebSocket,
    state: Arc<ServerState<WebSocketConnection>>,
) {
    let peer = pending.peer_addr();
    let limit = state.config.handshake_timeout();
    let conn = match tokio::time::timeout(limit, pending.complete()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::warn!(%peer, error = %e, "handshake failed");
            return;
        }
        Err(_) => {
            tracing::warn!(%peer, ?limit, "handshake timed out");
            return;
        }
    };

    let external_id = conn
        .query_param(EXTERNAL_ID_PARAM)
        .unwrap_or_default()
        .to_owned();
    handle_connection(Arc::new(conn), external_id, state).await;
}

async fn sweep_loop<C: Connection>(state: Arc<ServerState<C>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let swept = state.sweep().await;
        if !swept.is_empty() {
            tracing::info!(count = swept.len(), sessions = ?swept, "swept expired sessions");
        }
    }
}
