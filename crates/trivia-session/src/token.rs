//! Access tokens: the shared secret that admits participants to a session.
//!
//! A session is created with one token. Every browser message and every
//! admin request carries it. The token also bounds the window in which new
//! participants may join: once its time-to-live has run out it is marked
//! expired, and the mark never clears.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::SessionError;

/// A session's access token.
///
/// The `Debug` impl redacts the value so the token never ends up in logs.
pub struct AccessToken {
    value: String,
    created_at: Instant,
    ttl_secs: f64,
    expired: bool,
}

impl AccessToken {
    /// Wraps a known value, starting the clock now.
    pub fn new(value: impl Into<String>, ttl_secs: f64) -> Self {
        Self {
            value: value.into(),
            created_at: Instant::now(),
            ttl_secs,
            expired: false,
        }
    }

    /// Generates a random alphanumeric token of `len` characters.
    pub fn generate(len: usize, ttl_secs: f64) -> Self {
        let value: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self::new(value, ttl_secs)
    }

    /// The secret itself.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn ttl_secs(&self) -> f64 {
        self.ttl_secs
    }

    /// `true` once an expiration check has tripped.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Compares a candidate against the stored value.
    ///
    /// Expiry is not consulted here: participants who joined in
    /// time keep playing after the token lapses.
    ///
    /// # Errors
    /// - [`SessionError::EmptyToken`] when `candidate` is empty
    /// - [`SessionError::BadToken`] when it does not match
    pub fn verify(&self, candidate: &str) -> Result<(), SessionError> {
        if candidate.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        if candidate != self.value {
            return Err(SessionError::BadToken);
        }
        Ok(())
    }

    /// Runs [`check_expiration_at`](Self::check_expiration_at) against
    /// the current time.
    pub fn check_expiration(&mut self) -> Result<(), SessionError> {
        self.check_expiration_at(Instant::now())
    }

    /// Fails if the token is, or has just become, expired.
    ///
    /// The token lapses when the distance between `now` and creation time
    /// exceeds the TTL. The first check that notices sets the sticky
    /// expired flag and reports [`SessionError::TokenExpired`]; every later
    /// check reports [`SessionError::TokenAlreadyExpired`].
    pub fn check_expiration_at(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.expired {
            return Err(SessionError::TokenAlreadyExpired);
        }
        if self.age_at(now).as_secs_f64() > self.ttl_secs {
            self.expired = true;
            return Err(SessionError::TokenExpired);
        }
        Ok(())
    }

    /// Whether the token is expired or would be at `now`, without
    /// touching the flag.
    pub fn has_lapsed_at(&self, now: Instant) -> bool {
        self.expired || self.age_at(now).as_secs_f64() > self.ttl_secs
    }

    fn age_at(&self, now: Instant) -> Duration {
        if now >= self.created_at {
            now - self.created_at
        } else {
            self.created_at - now
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("expired", &self.expired)
            .finish()
    }
}
