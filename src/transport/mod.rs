//! ==============================================================================
//! transport/mod.rs - transport adapters
//! ==============================================================================
//!
//! purpose:
//!     owns the one connection to the device's telemetry and turns it into a
//!     single stream of `TransportEvent`s for the engine.
//!
//! adapters:
//!     - mqtt.rs: broker connection, subscribes the configured topics.
//!     - websocket.rs: socket served by the device itself, frames carry a
//!       {topic, payload} envelope.
//!
//! retry policy (both adapters):
//!     on error or unexpected close the adapter reports `Disconnected`, waits
//!     the fixed backoff, reports `Connecting` and tries again. there is no
//!     retry limit; cancelling the session token is the only way out, and
//!     it also interrupts a pending backoff.
//!
//! ==============================================================================

pub mod mqtt;
pub mod websocket;

use crate::config::{DashboardConfig, TransportKind};
use crate::decode::TopicMap;
use crate::health::LinkEvent;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use mqtt::MqttAdapter;
pub use websocket::DeviceSocketAdapter;

/// everything an adapter reports to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Status(LinkEvent),
    Message { topic: String, payload: Vec<u8> },
    /// a frame that could not be split into topic and payload
    Malformed { reason: String },
}

pub type EventSender = mpsc::Sender<TransportEvent>;

/// start the adapter selected by `config.transport.kind`
pub fn spawn(
    config: &DashboardConfig,
    topics: &TopicMap,
    events: EventSender,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let backoff = config.transport.reconnect_backoff();
    match config.transport.kind {
        TransportKind::Mqtt => {
            let adapter = MqttAdapter::new(&config.mqtt, topics, backoff);
            tokio::spawn(adapter.run(events, shutdown))
        }
        TransportKind::DeviceSocket => {
            let adapter = DeviceSocketAdapter::new(config.device_socket.url(), backoff);
            tokio::spawn(adapter.run(events, shutdown))
        }
    }
}

/// false once the engine has gone away
async fn emit(events: &EventSender, event: TransportEvent) -> bool {
    events.send(event).await.is_ok()
}

async fn emit_status(events: &EventSender, link: LinkEvent) -> bool {
    emit(events, TransportEvent::Status(link)).await
}

/// sleep for the backoff; false if the session was cancelled meanwhile
async fn wait_backoff(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn backoff_completes_when_not_cancelled() {
        let token = CancellationToken::new();
        assert!(wait_backoff(Duration::from_secs(2), &token).await);
    }

    #[tokio::test]
    async fn backoff_is_interrupted_by_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait_backoff(Duration::from_secs(3600), &token).await);
    }

    #[tokio::test]
    async fn emit_reports_closed_engine() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!emit_status(&tx, LinkEvent::Connecting).await);
    }
}
