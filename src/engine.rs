//! ==============================================================================
//! engine.rs - telemetry ingestion engine
//! ==============================================================================
//!
//! purpose:
//!     keeps the session's view of the device up to date from the transport's
//!     event stream and publishes a fresh snapshot after every change.
//!
//! two layers:
//!     - TelemetryState: the synchronous core. decode, merge, integrate and
//!       count, with `now` passed in. no i/o, no timers.
//!     - IngestionEngine: the single-writer event loop. it owns the state and
//!       is the only thing that mutates it; transport events, publisher
//!       commands and the 1 Hz uptime tick are all serialized through it.
//!
//! architecture:
//!
//! ```text
//!     ┌───────────────┐ TransportEvent ┌──────────────────────────────┐
//!     │ transport     │ ─────────────▶ │ IngestionEngine (event loop) │
//!     │ adapter task  │     (mpsc)     │  ┌────────────────────────┐  │
//!     └───────────────┘                │  │ TelemetryState         │  │
//!     ┌───────────────┐ EngineCommand  │  │  decode ─▶ merge       │  │
//!     │ StatePublisher│ ─────────────▶ │  │  EnergyIntegrator      │  │
//!     │ (reset energy)│     (mpsc)     │  │  ConnectionHealthTrkr  │  │
//!     └───────▲───────┘                │  └────────────────────────┘  │
//!             │  Arc<TelemetrySnapshot>│   1 Hz uptime interval       │
//!             └──────────(watch)───────┴──────────────────────────────┘
//! ```
//!
//! failure policy:
//!     nothing in here returns an error to the caller. a bad payload is
//!     logged, counted and dropped; the previous value stays on display.
//!
//! ==============================================================================

use crate::clock::SessionClock;
use crate::decode::{self, Channel, DecodeError, DecodePolicy, Decoded, TopicMap};
use crate::domain::{IngestionStats, PowerReading, SpectrumReading, TelemetrySnapshot, TemperatureReading, TiltReading};
use crate::energy::EnergyIntegrator;
use crate::health::{ConnectionHealthTracker, LinkEvent};
use crate::sink::{ReadingSink, RecordKind, SinkRecord};
use crate::transport::TransportEvent;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const UPTIME_PERIOD: Duration = Duration::from_secs(1);

/// what happened to one inbound message
#[derive(Debug)]
pub enum MessageOutcome {
    Applied(RecordKind),
    Rejected(Channel, DecodeError),
    /// topic is not one of the configured channels
    Unrouted,
}

// ==============================================================================
// synchronous core
// ==============================================================================

#[derive(Debug, Clone)]
pub struct TelemetryState {
    topics: TopicMap,
    policy: DecodePolicy,
    temperature: TemperatureReading,
    power: PowerReading,
    spectrum: Option<SpectrumReading>,
    tilt: Option<TiltReading>,
    energy: EnergyIntegrator,
    health: ConnectionHealthTracker,
    messages_received: u64,
    fft_updates: u64,
    last_message_time: u64,
}

impl TelemetryState {
    /// fresh state for a session starting at `now`
    pub fn new(topics: TopicMap, policy: DecodePolicy, advance_on_idle: bool, now: u64) -> Self {
        Self {
            topics,
            policy,
            temperature: TemperatureReading { timestamp: now, ..Default::default() },
            power: PowerReading { timestamp: now, ..Default::default() },
            spectrum: None,
            tilt: None,
            energy: EnergyIntegrator::new(now, advance_on_idle),
            health: ConnectionHealthTracker::new(),
            messages_received: 0,
            fft_updates: 0,
            last_message_time: now,
        }
    }

    /// count, decode and merge one message
    pub fn on_message(&mut self, topic: &str, payload: &[u8], now: u64) -> MessageOutcome {
        self.count_message(now);

        let Some(channel) = self.topics.resolve(topic) else {
            tracing::debug!(topic = %topic, "ignoring message on unrouted topic");
            return MessageOutcome::Unrouted;
        };

        match decode::decode(channel, payload, now, &self.policy) {
            Ok(decoded) => MessageOutcome::Applied(self.merge(decoded, now)),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "discarding undecodable message");
                MessageOutcome::Rejected(channel, e)
            }
        }
    }

    /// a frame the transport could not even split into topic and payload
    pub fn on_malformed(&mut self, reason: &str, now: u64) {
        self.count_message(now);
        tracing::warn!(reason = %reason, "discarding malformed frame");
    }

    pub fn on_status(&mut self, event: &LinkEvent, now: u64) {
        self.health.apply(event, now);
    }

    /// recompute connection uptime
    pub fn tick(&mut self, now: u64) {
        self.health.tick(now);
    }

    pub fn reset_energy(&mut self, now: u64) {
        self.energy.reset(now);
    }

    pub fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            connection: self.health.status().clone(),
            temperature: self.temperature.clone(),
            power: self.power.clone(),
            spectrum: self.spectrum.clone(),
            tilt: self.tilt.clone(),
            energy: self.energy.accumulator().clone(),
            stats: IngestionStats {
                messages_received: self.messages_received,
                fft_updates: self.fft_updates,
                connection_uptime_seconds: self.health.uptime_seconds(),
                last_message_time: self.last_message_time,
            },
        }
    }

    fn count_message(&mut self, now: u64) {
        self.messages_received += 1;
        self.last_message_time = now;
    }

    fn merge(&mut self, decoded: Decoded, now: u64) -> RecordKind {
        match decoded {
            Decoded::Temperature(sensor, value) => {
                self.temperature.merge(sensor, value, now);
                RecordKind::Temperature
            }
            Decoded::Power(reading) => {
                let power_mw = reading.power;
                self.power = reading;
                self.energy.integrate(power_mw, now);
                RecordKind::Power
            }
            Decoded::Spectrum(reading) => {
                self.spectrum = Some(reading);
                self.fft_updates += 1;
                RecordKind::Spectrum
            }
            Decoded::Tilt(reading) => {
                self.tilt = Some(reading);
                RecordKind::Tilt
            }
        }
    }
}

// ==============================================================================
// event loop
// ==============================================================================

/// requests from presentation consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    ResetEnergy,
}

pub struct IngestionEngine {
    state: TelemetryState,
    events: mpsc::Receiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    snapshots: watch::Sender<Arc<TelemetrySnapshot>>,
    sink: Option<Arc<dyn ReadingSink>>,
    show_sensor_data: bool,
    clock: SessionClock,
}

impl IngestionEngine {
    pub fn new(
        state: TelemetryState,
        events: mpsc::Receiver<TransportEvent>,
        commands: mpsc::UnboundedReceiver<EngineCommand>,
    ) -> (Self, watch::Receiver<Arc<TelemetrySnapshot>>) {
        let (snapshots, rx) = watch::channel(Arc::new(state.snapshot()));
        let engine = Self {
            state,
            events,
            commands,
            snapshots,
            sink: None,
            show_sensor_data: false,
            clock: SessionClock::start(),
        };
        (engine, rx)
    }

    /// stamp events with `clock` (the one the state was created from)
    pub fn with_clock(mut self, clock: SessionClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReadingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// log accepted readings at info instead of debug
    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    /// run until `shutdown` fires; the uptime timer dies with the loop.
    /// events already queued when it fires are still applied.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut uptime: Option<Interval> = None;
        let mut events_open = true;
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.drain_events();
                    break;
                }

                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event, self.clock.now_ms()),
                    None => {
                        tracing::debug!("transport event channel closed");
                        events_open = false;
                        continue;
                    }
                },

                command = self.commands.recv(), if commands_open => match command {
                    Some(EngineCommand::ResetEnergy) => {
                        tracing::info!("energy total reset");
                        self.state.reset_energy(self.clock.now_ms());
                        self.publish();
                    }
                    None => {
                        commands_open = false;
                        continue;
                    }
                },

                _ = next_uptime_tick(&mut uptime) => {
                    self.state.tick(self.clock.now_ms());
                    self.publish();
                }
            }

            sync_uptime_timer(self.state.is_connected(), &mut uptime);
        }

        tracing::debug!("ingestion engine stopped");
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event, self.clock.now_ms());
        }
    }

    fn handle_event(&mut self, event: TransportEvent, now: u64) {
        match event {
            TransportEvent::Status(link) => {
                tracing::info!(link = ?link, "link status changed");
                self.state.on_status(&link, now);
                self.publish();
            }
            TransportEvent::Message { topic, payload } => {
                let outcome = self.state.on_message(&topic, &payload, now);
                let snapshot = self.publish();
                if let MessageOutcome::Applied(kind) = outcome {
                    self.log_reading(kind, &snapshot);
                    if let Some(sink) = &self.sink {
                        sink.record(SinkRecord::from_snapshot(kind, &snapshot, now));
                    }
                }
            }
            TransportEvent::Malformed { reason } => {
                self.state.on_malformed(&reason, now);
                self.publish();
            }
        }
    }

    fn publish(&self) -> Arc<TelemetrySnapshot> {
        let snapshot = Arc::new(self.state.snapshot());
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn log_reading(&self, kind: RecordKind, snap: &TelemetrySnapshot) {
        macro_rules! reading {
            ($($arg:tt)+) => {
                if self.show_sensor_data {
                    tracing::info!($($arg)+)
                } else {
                    tracing::debug!($($arg)+)
                }
            };
        }

        match kind {
            RecordKind::Temperature => {
                let t = &snap.temperature;
                reading!(t1 = t.t1, t2 = t.t2, t3 = t.t3, "temperature");
            }
            RecordKind::Power => {
                let p = &snap.power;
                reading!(voltage = p.voltage, current = p.current, power = p.power, energy_wh = snap.energy.total_energy, "power");
            }
            RecordKind::Spectrum => {
                if let Some(s) = &snap.spectrum {
                    reading!(fs = s.fs, bins = s.bins.len(), peak = s.peak, "spectrum");
                }
            }
            RecordKind::Tilt => {
                if let Some(t) = &snap.tilt {
                    reading!(pitch = t.pitch, roll = t.roll, "tilt");
                }
            }
        }
    }
}

async fn next_uptime_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// arm the 1 Hz timer while connected, drop it otherwise
fn sync_uptime_timer(connected: bool, timer: &mut Option<Interval>) {
    match (connected, timer.is_some()) {
        (true, false) => {
            let mut interval = tokio::time::interval_at(Instant::now() + UPTIME_PERIOD, UPTIME_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *timer = Some(interval);
        }
        (false, true) => *timer = None,
        _ => {}
    }
}
