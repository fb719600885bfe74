//! # Trivia
//!
//! A coordinator for live multi-player trivia games.
//!
//! Browsers connect over WebSocket, log in to a session with its access
//! token, and answer the questions a quiz master pushes through the admin
//! HTTP API. The server keeps scores, tells each player whether they were
//! right, and publishes the scoreboard once everyone has answered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trivia::prelude::*;
//!
//! # async fn run() -> Result<(), TriviaError> {
//! let server = TriviaServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .admin_bind("127.0.0.1:8081")
//!     .build()
//!     .await?;
//! let token = server.open_session("quiz night").await;
//! println!("players join with token {token}");
//! server.run().await
//! # }
//! ```

mod admin;
mod error;
mod handler;
pub mod http;
pub mod logging;
mod server;

#[cfg(test)]
mod test_support;

pub use admin::QuestionRecord;
pub use error::{ErrorKind, TriviaError};
pub use server::{EXTERNAL_ID_PARAM, ServerState, TriviaServer, TriviaServerBuilder};

pub mod prelude {
    pub use crate::{QuestionRecord, ServerState, TriviaError, TriviaServer, TriviaServerBuilder};
    pub use trivia_protocol::{
        AnswerBitmap, ClientMessage, GuessData, PlayerView, ScoreEntry, ServerMessage,
    };
    pub use trivia_session::{Answer, DeliveryReport, SessionConfig};
    pub use trivia_transport::{Connection, ConnectionId};
}
