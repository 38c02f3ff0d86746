//! Enumerated bus configuration (spec §6).

use std::time::Duration;

/// Request-id modulus — the 32767th consecutive id wraps back to 0.
pub const ID_WRAP: u16 = 32767;

/// Key-derivation salt shared with `vacuum_crypto`.
pub const SALT: &[u8] = vacuum_crypto::SALT;

/// Tunables for [`crate::DeviceBus::connect`].
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Timeout for the connect handshake and for each in-flight request.
    pub connect_timeout: Duration,
    /// Window after which a session with no inbound traffic is considered stale.
    pub session_expiry: Duration,
    /// MQTT keepalive interval.
    pub keepalive: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(4),
            session_expiry: Duration::from_secs(60),
            keepalive: Duration::from_secs(60),
        }
    }
}
