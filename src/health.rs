//! ==============================================================================
//! health.rs - connection health tracker
//! ==============================================================================
//!
//! purpose:
//!     follows the transport's link events and keeps the status badge plus
//!     the connection uptime counter.
//!
//! state machine:
//!
//! ```text
//!     disconnected ──Connecting──▶ connecting ──Connected──▶ connected
//!          ▲                            │                        │
//!          └────────Disconnected────────┴──────Disconnected──────┘
//!
//!     every event is accepted from every state; there is no terminal state.
//! ```
//!
//! uptime:
//!     entering `connected` records a base time and zeroes the counter.
//!     `tick(now)` recomputes `now - base` while connected (the engine
//!     drives it at 1 Hz). leaving `connected` drops the base, so the value
//!     from the last tick stays frozen until the next connection.
//!
//! ==============================================================================

use crate::domain::{ConnectionStatus, LinkState};

/// lifecycle event emitted by a transport adapter
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connecting,
    Connected,
    Disconnected { error: Option<String> },
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionHealthTracker {
    status: ConnectionStatus,
    connected_since: Option<u64>,
    uptime_seconds: f64,
}

impl ConnectionHealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `now` is only used as the uptime base on `Connected`
    pub fn apply(&mut self, event: &LinkEvent, now: u64) {
        match event {
            LinkEvent::Connecting => {
                // a retry keeps the previous failure reason on the badge
                self.status.state = LinkState::Connecting;
                self.connected_since = None;
            }
            LinkEvent::Connected => {
                self.status = ConnectionStatus { state: LinkState::Connected, error: None };
                self.connected_since = Some(now);
                self.uptime_seconds = 0.0;
            }
            LinkEvent::Disconnected { error } => {
                self.connected_since = None;
                self.status = ConnectionStatus {
                    state: LinkState::Disconnected,
                    error: error.clone(),
                };
            }
        }
    }

    /// recompute uptime; no-op unless connected
    pub fn tick(&mut self, now: u64) -> f64 {
        if let Some(base) = self.connected_since {
            self.uptime_seconds = elapsed_seconds(base, now);
        }
        self.uptime_seconds
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connected_since.is_some()
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.uptime_seconds
    }
}

fn elapsed_seconds(base: u64, now: u64) -> f64 {
    now.saturating_sub(base) as f64 / 1000.0
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn disconnected(reason: &str) -> LinkEvent {
        LinkEvent::Disconnected { error: Some(reason.to_string()) }
    }

    #[test]
    fn starts_disconnected() {
        let t = ConnectionHealthTracker::new();
        assert_eq!(t.status().state, LinkState::Disconnected);
        assert_eq!(t.status().error, None);
        assert_eq!(t.uptime_seconds(), 0.0);
    }

    #[test]
    fn uptime_counts_while_connected() {
        let mut t = ConnectionHealthTracker::new();
        t.apply(&LinkEvent::Connecting, 0);
        t.apply(&LinkEvent::Connected, 1_000);
        for s in 1..=5 {
            t.tick(1_000 + s * 1_000);
        }
        assert!((t.uptime_seconds() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn disconnect_freezes_and_reconnect_restarts() {
        let mut t = ConnectionHealthTracker::new();
        t.apply(&LinkEvent::Connected, 0);
        t.tick(5_000);
        t.apply(&disconnected("broker went away"), 5_200);

        assert_eq!(t.status().state, LinkState::Disconnected);
        assert_eq!(t.status().error.as_deref(), Some("broker went away"));
        let frozen = t.uptime_seconds();
        assert!((frozen - 5.0).abs() < 1e-9);

        t.tick(60_000);
        assert_eq!(t.uptime_seconds(), frozen);

        t.apply(&LinkEvent::Connecting, 61_000);
        assert_eq!(t.uptime_seconds(), frozen);

        t.apply(&LinkEvent::Connected, 62_000);
        assert_eq!(t.uptime_seconds(), 0.0);
        t.tick(64_000);
        assert!((t.uptime_seconds() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn connecting_keeps_last_error_and_connected_clears_it() {
        let mut t = ConnectionHealthTracker::new();
        t.apply(&disconnected("connection refused"), 0);
        t.apply(&LinkEvent::Connecting, 1_000);
        assert_eq!(t.status().state, LinkState::Connecting);
        assert_eq!(t.status().error.as_deref(), Some("connection refused"));

        t.apply(&LinkEvent::Connected, 2_000);
        assert!(t.status().is_connected());
        assert_eq!(t.status().error, None);
    }

    #[test]
    fn cycles_indefinitely() {
        let mut t = ConnectionHealthTracker::new();
        for round in 0..10u64 {
            let base = round * 10_000;
            t.apply(&LinkEvent::Connecting, base);
            t.apply(&LinkEvent::Connected, base + 100);
            assert!(t.is_connected());
            t.tick(base + 1_100);
            t.apply(&LinkEvent::Disconnected { error: None }, base + 1_100);
            assert!(!t.is_connected());
            assert!((t.uptime_seconds() - 1.0).abs() < 1e-9);
        }
    }
}
