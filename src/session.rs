//! ==============================================================================
//! session.rs - one dashboard session
//! ==============================================================================
//!
//! purpose:
//!     owns the engine instance and the transport task for the life of a
//!     session. there is no global state: the host creates a session at
//!     startup, passes `StatePublisher` clones to whoever needs them, and
//!     tears it down on exit.
//!
//! teardown order:
//!     1. cancel the adapter token   (stops the retry timer, closes the link)
//!     2. wait for the adapter task  (its final Disconnected reaches the engine)
//!     3. cancel the engine token    (applies queued events, drops the 1 Hz timer)
//!     4. wait for the engine task
//!     5. cancel and wait for the sink writer, if any
//!
//! ==============================================================================

use crate::clock::SessionClock;
use crate::config::DashboardConfig;
use crate::decode::{DecodePolicy, TopicMap};
use crate::engine::{IngestionEngine, TelemetryState};
use crate::publisher::StatePublisher;
use crate::sink::HttpSink;
use crate::transport::{self, TransportEvent};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// buffered transport events before the adapter waits on the engine
const EVENT_QUEUE: usize = 256;

pub struct DashboardSession {
    publisher: StatePublisher,
    adapter_token: CancellationToken,
    engine_token: CancellationToken,
    /// `None` when events come from an externally owned channel
    adapter: Option<JoinHandle<()>>,
    engine: JoinHandle<()>,
    sink_token: CancellationToken,
    sink: Option<JoinHandle<()>>,
}

impl DashboardSession {
    /// build the engine and connect the configured transport
    pub fn start(config: &DashboardConfig) -> Self {
        let topics = TopicMap::new(&config.topics);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);

        let mut session = Self::with_events(config, events_rx);
        session.adapter = Some(transport::spawn(config, &topics, events_tx, session.adapter_token.clone()));
        session
    }

    /// engine only, fed by an externally owned event channel
    pub fn with_events(config: &DashboardConfig, events: mpsc::Receiver<TransportEvent>) -> Self {
        let clock = SessionClock::start();
        let state = TelemetryState::new(
            TopicMap::new(&config.topics),
            DecodePolicy { default_sample_rate: config.default_sample_rate() },
            config.energy.advance_on_idle,
            clock.now_ms(),
        );
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (engine, snapshots) = IngestionEngine::new(state, events, commands_rx);
        let mut engine = engine
            .with_clock(clock)
            .show_sensor_data(config.logging.show_sensor_data);

        let sink_token = CancellationToken::new();
        let mut sink = None;
        if let Some(url) = &config.sink.url {
            match HttpSink::new(url.clone(), config.sink.timeout(), config.sink.queue_capacity) {
                Ok((handle, worker)) => {
                    engine = engine.with_sink(Arc::new(handle));
                    sink = Some(tokio::spawn(worker.run(sink_token.clone())));
                }
                Err(e) => tracing::error!(url = %url, error = %e, "sink disabled, failed to build http client"),
            }
        }

        let engine_token = CancellationToken::new();
        let engine = tokio::spawn(engine.run(engine_token.clone()));

        Self {
            publisher: StatePublisher::new(snapshots, commands_tx),
            adapter_token: CancellationToken::new(),
            engine_token,
            adapter: None,
            engine,
            sink_token,
            sink,
        }
    }

    pub fn publisher(&self) -> StatePublisher {
        self.publisher.clone()
    }

    /// stop everything in order and wait for both tasks
    pub async fn shutdown(self) {
        tracing::info!("shutting down dashboard session");

        self.adapter_token.cancel();
        if let Some(adapter) = self.adapter {
            if let Err(e) = adapter.await {
                tracing::error!(error = %e, "transport task failed");
            }
        }

        self.engine_token.cancel();
        if let Err(e) = self.engine.await {
            tracing::error!(error = %e, "engine task failed");
        }

        self.sink_token.cancel();
        if let Some(sink) = self.sink {
            if let Err(e) = sink.await {
                tracing::error!(error = %e, "sink task failed");
            }
        }
    }
}
