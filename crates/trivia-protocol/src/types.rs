//! Message types for the realtime wire format.
//!
//! Every frame on the realtime connection is a small JSON object with a
//! `type` discriminator. Inbound frames carry `username`, `token`, and
//! `data`; outbound frames carry `data` only.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::AnswerBitmap;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// What a browser is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessageKind {
    /// Join the session (or resume a benched identity).
    Login,
    /// Answer the current question.
    Guess,
}

/// The `data` of a guess.
///
/// A numeric guess is the bitmap of the selected choices (marker excluded);
/// a text guess is compared verbatim against a single-answer question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuessData {
    Choice(f64),
    Text(String),
}

/// An inbound realtime message.
///
/// ```json
/// {"type":"login","username":"alice","token":"k3y"}
/// {"type":"guess","token":"k3y","data":18}
/// ```
///
/// Missing string fields decode as empty; an empty token is rejected by the
/// registry, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: ClientMessageKind,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<GuessData>,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A participant as shown to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    /// The client-supplied id from the connect URL, omitted when absent.
    #[serde(rename = "uuid", default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    pub score: i64,
}

/// One row of the scoreboard read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: i64,
}

/// The current question as pushed to browsers.
///
/// `answer` is only present for multiple choice questions: the browser
/// needs the marker bit to pick checkboxes or radio buttons. Single text
/// answers are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerBitmap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    pub weight: i64,
}

/// An outbound realtime message.
///
/// Adjacently tagged, so `PlayerMessage(true)` travels as
/// `{"type":"player_message","data":true}` and `Logout` as
/// `{"type":"logout"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Something the sender did failed; the text is for display.
    Error(String),
    /// Someone joined or resumed; carries the active pool.
    PlayerAdd(Vec<PlayerView>),
    /// Someone was benched; carries the remaining active pool.
    PlayerDelete(Vec<PlayerView>),
    /// Verdict on the receiver's own guess.
    PlayerMessage(bool),
    /// A note for one participant.
    NotifyPlayer(String),
    /// A note for everyone.
    NotifyAll(String),
    /// Scores changed; carries the active pool.
    UpdateScoreboard(Vec<PlayerView>),
    /// A new question was installed. Browsers expect `data` to be the
    /// question as a JSON-encoded string, not a nested object.
    Question(#[serde(with = "json_string")] QuestionView),
    /// The receiver has been removed from play.
    Logout,
}

/// (De)serializes a value as a string holding its JSON encoding.
mod json_string {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: serde::de::DeserializeOwned,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}
