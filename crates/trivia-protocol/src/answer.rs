//! The answer bitmap: one bit per choice plus a multi-select marker.
//!
//! ```text
//!  bit 15      bits 14 ............................ 0
//! ┌──────┬──────────────────────────────────────────────┐
//! │marker│ choice 15                          choice 1  │
//! └──────┴──────────────────────────────────────────────┘
//! ```
//!
//! The marker is set when more than one choice is correct. Browsers use it
//! to render checkboxes instead of radio buttons, so it is part of the wire
//! value, but it is never a choice and is stripped before decoding.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Bit 15: "this question has more than one correct choice".
pub const MULTI_SELECT_MARKER: u16 = 1 << 15;

/// Highest one-based choice index the bitmap can hold.
pub const MAX_CHOICES: u32 = 15;

/// Encoded set of correct (or guessed) choice indices.
///
/// Serialized as the bare `u16`, which is what the browser receives in the
/// `question` event and echoes back (without the marker) in a `guess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerBitmap(u16);

impl AnswerBitmap {
    /// Encodes one-based choice indices.
    ///
    /// Each index `i` contributes `1 << (i - 1)`. The marker is added when
    /// the resulting set has more than one member; repeating an index does
    /// not count twice.
    ///
    /// # Errors
    /// - [`ProtocolError::ChoiceOutOfRange`] for an index outside `1..=15`
    /// - [`ProtocolError::EmptyAnswer`] when no index was given
    pub fn encode<I>(indices: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut bits: u16 = 0;
        for index in indices {
            if !(1..=MAX_CHOICES).contains(&index) {
                return Err(ProtocolError::ChoiceOutOfRange(index));
            }
            bits |= 1u16 << (index - 1);
        }
        if bits == 0 {
            return Err(ProtocolError::EmptyAnswer);
        }
        if bits.count_ones() > 1 {
            bits |= MULTI_SELECT_MARKER;
        }
        Ok(Self(bits))
    }

    /// Wraps a raw wire value as-is.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw wire value, marker included.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// `true` when the multi-select marker is set.
    pub const fn is_multi_select(self) -> bool {
        self.0 & MULTI_SELECT_MARKER != 0
    }

    /// The choice bits with the marker cleared.
    pub const fn choice_bits(self) -> u16 {
        self.0 & !MULTI_SELECT_MARKER
    }

    /// One-based positions of every set choice bit, ascending.
    ///
    /// Each addend of [`encode`](Self::encode) is a distinct power of two,
    /// so a straight bit scan recovers exactly the original indices.
    pub fn decode(self) -> Vec<u32> {
        let bits = self.choice_bits();
        (0..MAX_CHOICES)
            .filter(|bit| bits & (1u16 << bit) != 0)
            .map(|bit| bit + 1)
            .collect()
    }

    /// Checks a numeric guess from the browser against this answer.
    ///
    /// The browser submits the bitmap of its selections without the
    /// marker, so when the stored answer carries the marker the marker's
    /// weight is added to the guess before comparing. The comparison is
    /// done on `f64` because that is how the guess arrives in JSON;
    /// fractional or out-of-range guesses simply never match.
    pub fn matches_guess(self, submitted: f64) -> bool {
        let adjusted = if self.is_multi_select() {
            submitted + f64::from(MULTI_SELECT_MARKER)
        } else {
            submitted
        };
        f64::from(self.0) == adjusted
    }

    /// Labels of the selected choices, in index order.
    ///
    /// Indices beyond the end of `choices` are skipped.
    pub fn labels<'a>(self, choices: &'a [String]) -> Vec<&'a str> {
        self.decode()
            .into_iter()
            .filter_map(|index| choices.get(index as usize - 1))
            .map(String::as_str)
            .collect()
    }
}

impl From<AnswerBitmap> for u16 {
    fn from(bitmap: AnswerBitmap) -> Self {
        bitmap.raw()
    }
}
