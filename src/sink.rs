//! ==============================================================================
//! sink.rs - persistence sink interface
//! ==============================================================================
//!
//! purpose:
//!     hands each accepted reading to an external store. the engine never
//!     waits for the sink and never learns whether it succeeded.
//!
//! record shape:
//!     one row per accepted reading, laid out like the sensor_readings table
//!     of the data sink (motor/bearing temperatures, fft magnitudes, tilt,
//!     electrical input, power-on flag). columns the reading does not carry
//!     are taken from the current snapshot.
//!
//! http sink:
//!     `HttpSink` only enqueues. one `SinkWorker` per session drains a
//!     bounded queue and posts records one at a time with a request timeout.
//!     a full queue drops the new record with a warning, and cancelling the
//!     worker aborts the request in flight.
//!
//! relationships:
//!     - used by: engine.rs (offers every accepted reading)
//!     - owned by: session.rs (spawns and stops the worker)
//!     - uses: reqwest (SinkWorker pushes json to the configured url)
//!
//! ==============================================================================

use crate::domain::TelemetrySnapshot;

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sink rejected record with status {0}")]
    Status(reqwest::StatusCode),
}

/// which reading triggered the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Temperature,
    Power,
    Spectrum,
    Tilt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkRecord {
    pub kind: RecordKind,
    pub recorded_at: u64,
    pub temp_motor: f64,
    pub temp_bearing_top: f64,
    pub temp_bearing_bottom: f64,
    /// bin magnitudes in received order
    pub vibration_fft: Option<Vec<f64>>,
    pub tilt_angle: Option<f64>,
    pub input_voltage: f64,
    pub input_current: f64,
    pub is_powered: bool,
}

impl SinkRecord {
    pub fn from_snapshot(kind: RecordKind, snapshot: &TelemetrySnapshot, now: u64) -> Self {
        Self {
            kind,
            recorded_at: now,
            temp_motor: snapshot.temperature.t1,
            temp_bearing_top: snapshot.temperature.t2,
            temp_bearing_bottom: snapshot.temperature.t3,
            vibration_fft: snapshot
                .spectrum
                .as_ref()
                .map(|s| s.bins.iter().map(|b| b.m).collect()),
            tilt_angle: snapshot.tilt.as_ref().map(|t| t.pitch),
            input_voltage: snapshot.power.voltage,
            input_current: snapshot.power.current,
            is_powered: snapshot.power.power > 0.0,
        }
    }
}

/// fire-and-forget consumer of accepted readings
pub trait ReadingSink: Send + Sync {
    fn record(&self, record: SinkRecord);
}

/// queue side of the http sink; cheap to clone
#[derive(Clone)]
pub struct HttpSink {
    queue: mpsc::Sender<SinkRecord>,
}

/// posts queued records as json to an http endpoint
pub struct SinkWorker {
    client: reqwest::Client,
    url: String,
    records: mpsc::Receiver<SinkRecord>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration, capacity: usize) -> Result<(Self, SinkWorker), SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let (queue, records) = mpsc::channel(capacity.max(1));
        let worker = SinkWorker { client, url: url.into(), records };
        Ok((Self { queue }, worker))
    }

    /// false when the record was dropped
    pub fn enqueue(&self, record: SinkRecord) -> bool {
        match self.queue.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                tracing::warn!(kind = ?record.kind, "sink queue full, dropping record");
                false
            }
            Err(TrySendError::Closed(record)) => {
                tracing::debug!(kind = ?record.kind, "sink worker stopped, dropping record");
                false
            }
        }
    }
}

impl ReadingSink for HttpSink {
    fn record(&self, record: SinkRecord) {
        self.enqueue(record);
    }
}

impl SinkWorker {
    pub async fn send(&self, record: &SinkRecord) -> Result<(), SinkError> {
        let resp = self.client.post(&self.url).json(record).send().await?;
        if !resp.status().is_success() {
            return Err(SinkError::Status(resp.status()));
        }
        Ok(())
    }

    /// post records until the queue closes or `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(url = %self.url, "sink writer started");
        loop {
            let record = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                record = self.records.recv() => match record {
                    Some(record) => record,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.send(&record) => {
                    if let Err(e) = result {
                        tracing::warn!(url = %self.url, kind = ?record.kind, error = %e, "sink write failed");
                    }
                }
            }
        }
        let dropped = self.records.len();
        if dropped > 0 {
            tracing::warn!(dropped, "sink writer stopped with records queued");
        }
        tracing::debug!("sink writer stopped");
    }
}
