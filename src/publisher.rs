//! ==============================================================================
//! publisher.rs - read-only state handle for presentation layers
//! ==============================================================================
//!
//! purpose:
//!     the only surface consumers see. it hands out the latest immutable
//!     snapshot and forwards the "reset energy" command to the engine.
//!
//! consistency:
//!     snapshots are built by the engine after a whole merge and swapped in
//!     behind a `watch` channel, so a reader never observes a half-applied
//!     temperature merge or power replacement.
//!
//! ==============================================================================

use crate::domain::TelemetrySnapshot;
use crate::engine::EngineCommand;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Clone)]
pub struct StatePublisher {
    snapshots: watch::Receiver<Arc<TelemetrySnapshot>>,
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl StatePublisher {
    pub fn new(
        snapshots: watch::Receiver<Arc<TelemetrySnapshot>>,
        commands: mpsc::UnboundedSender<EngineCommand>,
    ) -> Self {
        Self { snapshots, commands }
    }

    /// most recent merged state
    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.snapshots.borrow().clone()
    }

    /// a receiver that wakes on every published change
    pub fn subscribe(&self) -> watch::Receiver<Arc<TelemetrySnapshot>> {
        self.snapshots.clone()
    }

    /// zero the energy total; ignored (and logged) once the engine is gone
    pub fn reset_energy(&self) {
        if self.commands.send(EngineCommand::ResetEnergy).is_err() {
            tracing::warn!("energy reset requested after engine shutdown");
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_latest_publish() {
        let (tx, rx) = watch::channel(Arc::new(TelemetrySnapshot::default()));
        let (cmd_tx, _cmd_rx) = mpsc::unbounded_channel();
        let publisher = StatePublisher::new(rx, cmd_tx);

        let mut next = TelemetrySnapshot::default();
        next.stats.messages_received = 3;
        tx.send_replace(Arc::new(next));

        assert_eq!(publisher.snapshot().stats.messages_received, 3);
    }

    #[test]
    fn reset_is_forwarded() {
        let (_tx, rx) = watch::channel(Arc::new(TelemetrySnapshot::default()));
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let publisher = StatePublisher::new(rx, cmd_tx);

        publisher.reset_energy();
        publisher.clone().reset_energy();
        assert_eq!(cmd_rx.try_recv(), Ok(EngineCommand::ResetEnergy));
        assert_eq!(cmd_rx.try_recv(), Ok(EngineCommand::ResetEnergy));
    }

    #[test]
    fn reset_after_shutdown_does_not_panic() {
        let (_tx, rx) = watch::channel(Arc::new(TelemetrySnapshot::default()));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        drop(cmd_rx);
        StatePublisher::new(rx, cmd_tx).reset_energy();
    }
}
