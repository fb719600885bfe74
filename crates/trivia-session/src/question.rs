//! The question currently being played and the answers it accepts.

use std::collections::HashSet;

use trivia_protocol::{AnswerBitmap, GuessData, QuestionView};
use trivia_transport::ConnectionId;

/// What counts as a correct guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Free text, compared verbatim.
    Single(String),
    /// One or more choices out of the question's choice list.
    Bitmap(AnswerBitmap),
}

impl Answer {
    /// Whether `guess` is correct.
    ///
    /// A text guess only matches a text answer, a numeric guess only a
    /// bitmap answer; mixing the two is simply wrong.
    pub fn accepts(&self, guess: &GuessData) -> bool {
        match (self, guess) {
            (Self::Single(expected), GuessData::Text(text)) => expected == text,
            (Self::Bitmap(bitmap), GuessData::Choice(value)) => {
                bitmap.matches_guess(*value)
            }
            _ => false,
        }
    }
}

/// A question installed in a session, plus who has answered it.
#[derive(Debug, Clone)]
pub struct Question {
    prompt: String,
    answer: Answer,
    choices: Vec<String>,
    weight: i64,
    responders: HashSet<ConnectionId>,
}

impl Question {
    pub fn new(
        prompt: impl Into<String>,
        answer: Answer,
        choices: Vec<String>,
        weight: i64,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            answer,
            choices,
            weight,
            responders: HashSet::new(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Points awarded for a correct guess.
    pub fn weight(&self) -> i64 {
        self.weight
    }

    /// The event payload. Text answers are never sent to browsers.
    pub fn view(&self) -> QuestionView {
        let answer = match &self.answer {
            Answer::Bitmap(bitmap) => Some(*bitmap),
            Answer::Single(_) => None,
        };
        QuestionView {
            question: self.prompt.clone(),
            answer,
            choices: self.choices.clone(),
            weight: self.weight,
        }
    }

    /// The correct answer in words, for telling a participant who got it
    /// wrong.
    pub fn reveal(&self) -> String {
        match &self.answer {
            Answer::Single(text) => text.clone(),
            Answer::Bitmap(bitmap) => bitmap.labels(&self.choices).join(","),
        }
    }

    /// A guess in words, for the log.
    pub fn describe_guess(&self, guess: &GuessData) -> String {
        match guess {
            GuessData::Text(text) => text.clone(),
            GuessData::Choice(value) => {
                let whole = value.fract() == 0.0
                    && (0.0..=f64::from(u16::MAX)).contains(value);
                if whole && !self.choices.is_empty() {
                    AnswerBitmap::from_raw(*value as u16)
                        .labels(&self.choices)
                        .join(",")
                } else {
                    value.to_string()
                }
            }
        }
    }

    pub(crate) fn has_responded(&self, connection: ConnectionId) -> bool {
        self.responders.contains(&connection)
    }

    pub(crate) fn add_responder(&mut self, connection: ConnectionId) {
        self.responders.insert(connection);
    }

    pub(crate) fn responders(&self) -> &HashSet<ConnectionId> {
        &self.responders
    }
}
