//! ==============================================================================
//! domain.rs - telemetry data model
//! ==============================================================================
//!
//! purpose:
//!     the typed readings the engine keeps for one dashboard session, and
//!     the snapshot handed to every consumer.
//!
//! lifetimes:
//!     temperature, power, energy, connection status and stats always exist
//!     (zeroed at session start). spectrum and tilt stay `None` until the
//!     first message on their channel.
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

/// one of the three independent temperature probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemperatureSensor {
    /// motor housing
    T1,
    /// upper bearing
    T2,
    /// lower bearing
    T3,
}

/// latest value of each temperature probe in °C
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    /// time (ms) of the most recent accepted probe update
    pub timestamp: u64,
}

impl TemperatureReading {
    /// merge a single probe value, leaving the other two untouched
    pub fn merge(&mut self, sensor: TemperatureSensor, value: f64, now: u64) {
        match sensor {
            TemperatureSensor::T1 => self.t1 = value,
            TemperatureSensor::T2 => self.t2 = value,
            TemperatureSensor::T3 => self.t3 = value,
        }
        self.timestamp = now;
    }

    pub fn get(&self, sensor: TemperatureSensor) -> f64 {
        match sensor {
            TemperatureSensor::T1 => self.t1,
            TemperatureSensor::T2 => self.t2,
            TemperatureSensor::T3 => self.t3,
        }
    }
}

/// electrical input, replaced wholesale on every power message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    /// volts
    pub voltage: f64,
    /// milliamps
    pub current: f64,
    /// milliwatts
    pub power: f64,
    pub timestamp: u64,
}

/// a single (frequency, magnitude) sample of a spectrum
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FftBin {
    /// frequency in Hz
    pub f: f64,
    /// magnitude
    pub m: f64,
}

/// vibration spectrum; bins are kept in the order received
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumReading {
    /// sampling frequency in Hz
    pub fs: f64,
    pub bins: Vec<FftBin>,
    /// dominant frequency in Hz
    pub peak: f64,
    pub timestamp: u64,
}

/// orientation in degrees plus raw axis accelerations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TiltReading {
    pub pitch: f64,
    pub roll: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: u64,
}

/// cumulative energy in Wh and the integration boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyAccumulator {
    pub total_energy: f64,
    pub last_update: u64,
}

/// link state as shown on the status badge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: LinkState,
    /// human readable reason for the last failure, if any
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }
}

/// throughput counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionStats {
    pub messages_received: u64,
    pub fft_updates: u64,
    /// seconds since the current connection was established; frozen while
    /// not connected
    pub connection_uptime_seconds: f64,
    pub last_message_time: u64,
}

/// complete, internally consistent view of the device at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub connection: ConnectionStatus,
    pub temperature: TemperatureReading,
    pub power: PowerReading,
    pub spectrum: Option<SpectrumReading>,
    pub tilt: Option<TiltReading>,
    pub energy: EnergyAccumulator,
    pub stats: IngestionStats,
}
