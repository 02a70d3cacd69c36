//! ==============================================================================
//! clock.rs - wall clock for the engine
//! ==============================================================================
//!
//! purpose:
//!     the only place that reads the system clock. every engine operation
//!     takes `now` (unix epoch milliseconds) as an argument, so the async
//!     loop stamps events here and tests pass whatever time they like.
//!
//! session clock:
//!     the event loop reads the wall clock once at startup and then advances
//!     on tokio's monotonic clock. stamps never go backwards when the system
//!     time is adjusted, and a paused tokio runtime drives them in tests.
//!
//! ==============================================================================

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// current unix timestamp in milliseconds
///
/// a clock set before 1970 reads as 0 rather than failing.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// epoch milliseconds anchored at startup, advanced by `tokio::time`
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    wall_base: u64,
    started: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self { wall_base: now_ms(), started: Instant::now() }
    }

    pub fn now_ms(&self) -> u64 {
        self.wall_base + self.started.elapsed().as_millis() as u64
    }
}
