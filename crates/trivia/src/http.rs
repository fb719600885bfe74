//! Admin HTTP API.
//!
//! A small axum router over the operations in [`crate::admin`]. Every
//! route except `/health` needs the session's access token in the
//! `X-TRIVIA-APIKEY` header.
//!
//! | Route                         | Body        | Operation                     |
//! |-------------------------------|-------------|-------------------------------|
//! | `GET  /health`                |             | liveness probe                |
//! | `POST /kill?name=`            |             | [`ServerState::kill`]         |
//! | `POST /message?name=`         | text        | [`ServerState::message`]      |
//! | `POST /notify`                | text        | [`ServerState::notify_all`]   |
//! | `POST /query`                 | record      | [`ServerState::install_question`] |
//! | `POST /reset`                 |             | [`ServerState::reset_scores`] |
//! | `GET  /scoreboard`            |             | [`ServerState::scoreboard`]   |
//! | `POST /update_score?name=`    | integer     | [`ServerState::adjust_score`] |
//! | `POST /close`                 |             | [`ServerState::close_session`] |

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use trivia_protocol::{ProtocolError, ScoreEntry};
use trivia_session::SessionError;
use trivia_transport::Connection;

use crate::server::ServerState;
use crate::{ErrorKind, TriviaError};

/// Header that carries the access token.
pub const API_KEY_HEADER: &str = "x-trivia-apikey";

type SharedState<C> = State<Arc<ServerState<C>>>;

/// Builds the admin router around shared server state.
pub fn router<C: Connection>(state: Arc<ServerState<C>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/kill", post(kill::<C>))
        .route("/message", post(message::<C>))
        .route("/notify", post(notify::<C>))
        .route("/query", post(query::<C>))
        .route("/reset", post(reset::<C>))
        .route("/scoreboard", get(scoreboard::<C>))
        .route("/update_score", post(update_score::<C>))
        .route("/close", post(close::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The access token from the `X-TRIVIA-APIKEY` header.
///
/// A missing or empty header is rejected as an empty token.
pub struct ApiKey(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ApiKey {
    type Rejection = TriviaError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if value.is_empty() {
            return Err(SessionError::EmptyToken.into());
        }
        Ok(Self(value.to_owned()))
    }
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: String,
}

impl IntoResponse for TriviaError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Lookup => StatusCode::NOT_FOUND,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Protocol => StatusCode::BAD_REQUEST,
            ErrorKind::Delivery | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "admin request failed");
        } else {
            tracing::debug!(error = %self, %status, "admin request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn kill<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
    Query(q): Query<NameQuery>,
) -> Result<StatusCode, TriviaError> {
    state.kill(&token, &q.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn message<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
    Query(q): Query<NameQuery>,
    body: String,
) -> Result<StatusCode, TriviaError> {
    state.message(&token, &q.name, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn notify<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
    body: String,
) -> Result<StatusCode, TriviaError> {
    state.notify_all(&token, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn query<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
    body: String,
) -> Result<StatusCode, TriviaError> {
    state.install_question(&token, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
) -> Result<StatusCode, TriviaError> {
    state.reset_scores(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn scoreboard<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
) -> Result<Json<Vec<ScoreEntry>>, TriviaError> {
    Ok(Json(state.scoreboard(&token).await?))
}

async fn update_score<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
    Query(q): Query<NameQuery>,
    body: String,
) -> Result<Json<ScoreEntry>, TriviaError> {
    let delta = body.trim().parse::<i64>().map_err(|_| {
        ProtocolError::InvalidMessage(format!("score delta `{}` is not an integer", body.trim()))
    })?;
    let score = state.adjust_score(&token, &q.name, delta).await?;
    Ok(Json(ScoreEntry { name: q.name, score }))
}

async fn close<C: Connection>(
    State(state): SharedState<C>,
    ApiKey(token): ApiKey,
) -> Result<StatusCode, TriviaError> {
    state.close_session(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
