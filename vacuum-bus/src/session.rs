//! Connection lifecycle (spec §3, §4.4).
//!
//! One bus owns one MQTT session. The state only ever moves forward through
//! this list, except that a stale session can be kicked back to `Connecting`
//! by a fresh reconnect without dropping the pending-request table.

use std::time::Instant;

/// Where the bus's MQTT session currently sits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No socket, no subscription. Initial state.
    Disconnected,
    /// CONNECT sent, waiting on CONNACK and the topic subscription.
    Connecting,
    /// Subscribed and able to publish.
    Connected,
    /// Subscribed but no inbound traffic for longer than the configured
    /// session-expiry window — requests are still accepted but a reconnect
    /// is advisable.
    Stale,
}

impl SessionState {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Connected | Self::Stale)
    }
}

/// Tracks [`SessionState`] plus the last-seen-traffic clock used to derive
/// `Connected` → `Stale`.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    last_traffic: Option<Instant>,
    expiry: std::time::Duration,
}

impl Session {
    pub fn new(expiry: std::time::Duration) -> Self {
        Self { state: SessionState::Disconnected, last_traffic: None, expiry }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn begin_connect(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// CONNACK plus a successful subscription — the session is now live.
    pub fn mark_connected(&mut self) {
        self.state = SessionState::Connected;
        self.last_traffic = Some(Instant::now());
    }

    /// Any inbound frame resets the staleness clock.
    pub fn note_traffic(&mut self) {
        self.last_traffic = Some(Instant::now());
        if self.state == SessionState::Stale {
            self.state = SessionState::Connected;
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.last_traffic = None;
    }

    /// Call periodically; flips `Connected` to `Stale` once the expiry
    /// window has elapsed with no inbound traffic.
    pub fn check_staleness(&mut self) {
        if self.state != SessionState::Connected {
            return;
        }
        if let Some(last) = self.last_traffic {
            if last.elapsed() >= self.expiry {
                self.state = SessionState::Stale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_session_is_disconnected() {
        let s = Session::new(Duration::from_secs(60));
        assert_eq!(*s.state(), SessionState::Disconnected);
        assert!(!s.state().is_usable());
    }

    #[test]
    fn connect_then_mark_connected_is_usable() {
        let mut s = Session::new(Duration::from_secs(60));
        s.begin_connect();
        assert_eq!(*s.state(), SessionState::Connecting);
        s.mark_connected();
        assert!(s.state().is_usable());
    }

    #[test]
    fn staleness_only_trips_after_expiry_with_no_traffic() {
        let mut s = Session::new(Duration::from_millis(0));
        s.mark_connected();
        s.check_staleness();
        assert_eq!(*s.state(), SessionState::Stale);
        assert!(s.state().is_usable());
    }

    #[test]
    fn traffic_clears_staleness() {
        let mut s = Session::new(Duration::from_millis(0));
        s.mark_connected();
        s.check_staleness();
        assert_eq!(*s.state(), SessionState::Stale);
        s.note_traffic();
        assert_eq!(*s.state(), SessionState::Connected);
    }

    #[test]
    fn disconnect_clears_traffic_clock() {
        let mut s = Session::new(Duration::from_secs(60));
        s.mark_connected();
        s.mark_disconnected();
        assert_eq!(*s.state(), SessionState::Disconnected);
        assert!(!s.state().is_usable());
    }
}
