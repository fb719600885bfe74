//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration applied to every session the server opens.
///
/// You can create a config with `SessionConfig::default()` and then
/// override just the fields you care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long (in seconds) new participants may log in after the session
    /// opens. Participants already logged in keep playing past it.
    ///
    /// Default: one hour.
    pub token_ttl_secs: f64,

    /// Length of the generated alphanumeric access token.
    ///
    /// Default: 20 characters.
    pub token_len: usize,

    /// How often (in seconds) the server removes sessions whose token has
    /// lapsed and that nobody is playing in. 0 disables the sweep.
    ///
    /// Default: 60 seconds.
    pub sweep_interval_secs: u64,

    /// How long (in seconds) a single delivery to one participant may take
    /// before it is abandoned and counted as failed.
    ///
    /// Default: 5 seconds.
    pub send_timeout_secs: u64,

    /// How long (in seconds) a freshly accepted socket has to complete the
    /// WebSocket upgrade.
    ///
    /// Default: 10 seconds.
    pub handshake_timeout_secs: u64,
}

impl SessionConfig {
    /// The sweep period, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0)
            .then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 3600.0,
            token_len: 20,
            sweep_interval_secs: 60,
            send_timeout_secs: 5,
            handshake_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.token_ttl_secs, 3600.0);
        assert_eq!(config.token_len, 20);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_sweep_interval_zero_disables_sweep() {
        let config = SessionConfig {
            sweep_interval_secs: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.sweep_interval(), None);
    }
}
