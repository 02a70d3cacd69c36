//! ==============================================================================
//! decode.rs - per-channel payload decoding
//! ==============================================================================
//!
//! purpose:
//!     turns a raw (topic, payload) pair into a typed reading.
//!
//! channel table:
//!
//! ```text
//!     channel           payload                          reading
//!     ───────────────   ──────────────────────────────   ─────────────────────
//!     temperature-1/2/3 bare number as text              TemperatureReading.tN
//!     power             {voltage, current, power}        PowerReading
//!     spectrum          {fs?, bins:[{f,m}], peak?}       SpectrumReading
//!     tilt              {pitch?, roll?, x?, y?, z?}      TiltReading
//! ```
//!
//! defaulting policy (the one place it lives):
//!     a structured field that is absent, null, zero, non-numeric or not a
//!     finite number takes its default. numeric strings are accepted. the
//!     default is 0 for every field except spectrum `fs`, which falls back to
//!     `DecodePolicy::default_sample_rate`. a missing or non-array `bins`
//!     decodes as an empty spectrum.
//!
//! ```text
//!     only an unparseable document (or a payload that is not a json
//!     object) fails the whole message.
//! ```
//!
//! ==============================================================================

use crate::config::TopicsConfig;
use crate::domain::{FftBin, PowerReading, SpectrumReading, TemperatureSensor, TiltReading};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid utf-8")]
    NotUtf8,
    #[error("temperature payload {0:?} is not a number")]
    NotNumeric(String),
    #[error("temperature payload {0:?} is not finite")]
    NotFinite(String),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a json object, got {0}")]
    NotAnObject(&'static str),
}

/// logical stream a topic carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature(TemperatureSensor),
    Power,
    Spectrum,
    Tilt,
}

/// configured topic name -> channel
#[derive(Debug, Clone)]
pub struct TopicMap {
    entries: Vec<(String, Channel)>,
}

impl TopicMap {
    pub fn new(topics: &TopicsConfig) -> Self {
        Self {
            entries: vec![
                (topics.temperature_1.clone(), Channel::Temperature(TemperatureSensor::T1)),
                (topics.temperature_2.clone(), Channel::Temperature(TemperatureSensor::T2)),
                (topics.temperature_3.clone(), Channel::Temperature(TemperatureSensor::T3)),
                (topics.power.clone(), Channel::Power),
                (topics.spectrum.clone(), Channel::Spectrum),
                (topics.tilt.clone(), Channel::Tilt),
            ],
        }
    }

    pub fn resolve(&self, topic: &str) -> Option<Channel> {
        self.entries
            .iter()
            .find(|(name, _)| name == topic)
            .map(|(_, channel)| *channel)
    }

    /// every topic the adapter should subscribe to
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new(&TopicsConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodePolicy {
    pub default_sample_rate: f64,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self { default_sample_rate: 3200.0 }
    }
}

/// a successfully decoded message
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Temperature(TemperatureSensor, f64),
    Power(PowerReading),
    Spectrum(SpectrumReading),
    Tilt(TiltReading),
}

/// decode `payload` per the rules of `channel`, stamping records with `now`
pub fn decode(
    channel: Channel,
    payload: &[u8],
    now: u64,
    policy: &DecodePolicy,
) -> Result<Decoded, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;

    match channel {
        Channel::Temperature(sensor) => decode_temperature(text).map(|v| Decoded::Temperature(sensor, v)),
        Channel::Power => {
            let obj = parse_object(text)?;
            Ok(Decoded::Power(PowerReading {
                voltage: number_or(&obj, "voltage", 0.0),
                current: number_or(&obj, "current", 0.0),
                power: number_or(&obj, "power", 0.0),
                timestamp: now,
            }))
        }
        Channel::Spectrum => {
            let obj = parse_object(text)?;
            let bins = match obj.get("bins") {
                Some(Value::Array(items)) => items.iter().map(decode_bin).collect(),
                _ => Vec::new(),
            };
            Ok(Decoded::Spectrum(SpectrumReading {
                fs: number_or(&obj, "fs", policy.default_sample_rate),
                bins,
                peak: number_or(&obj, "peak", 0.0),
                timestamp: now,
            }))
        }
        Channel::Tilt => {
            let obj = parse_object(text)?;
            Ok(Decoded::Tilt(TiltReading {
                pitch: number_or(&obj, "pitch", 0.0),
                roll: number_or(&obj, "roll", 0.0),
                x: number_or(&obj, "x", 0.0),
                y: number_or(&obj, "y", 0.0),
                z: number_or(&obj, "z", 0.0),
                timestamp: now,
            }))
        }
    }
}

fn decode_temperature(text: &str) -> Result<f64, DecodeError> {
    let trimmed = text.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| DecodeError::NotNumeric(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(DecodeError::NotFinite(trimmed.to_string()));
    }
    Ok(value)
}

fn parse_object(text: &str) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(obj) => Ok(obj),
        Value::Null => Err(DecodeError::NotAnObject("null")),
        Value::Bool(_) => Err(DecodeError::NotAnObject("a boolean")),
        Value::Number(_) => Err(DecodeError::NotAnObject("a number")),
        Value::String(_) => Err(DecodeError::NotAnObject("a string")),
        Value::Array(_) => Err(DecodeError::NotAnObject("an array")),
    }
}

fn decode_bin(item: &Value) -> FftBin {
    match item {
        Value::Object(obj) => FftBin {
            f: number_or(obj, "f", 0.0),
            m: number_or(obj, "m", 0.0),
        },
        _ => FftBin::default(),
    }
}

fn number_or(obj: &Map<String, Value>, key: &str, default: f64) -> f64 {
    let value = match obj.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => default,
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_000;

    fn policy() -> DecodePolicy {
        DecodePolicy { default_sample_rate: 3200.0 }
    }

    #[test]
    fn topic_map_resolves_configured_names() {
        let map = TopicMap::default();
        assert_eq!(map.resolve("ppr/temp/t2"), Some(Channel::Temperature(TemperatureSensor::T2)));
        assert_eq!(map.resolve("ppr/vib/fft"), Some(Channel::Spectrum));
        assert_eq!(map.resolve("ppr/unknown"), None);
        assert_eq!(map.topics().count(), 6);
    }

    #[test]
    fn temperature_accepts_padded_number() {
        let decoded = decode(Channel::Temperature(TemperatureSensor::T1), b" 47.5\n", NOW, &policy()).unwrap();
        assert_eq!(decoded, Decoded::Temperature(TemperatureSensor::T1, 47.5));
    }

    #[test]
    fn temperature_rejects_text_and_nan() {
        let ch = Channel::Temperature(TemperatureSensor::T3);
        assert!(matches!(decode(ch, b"abc", NOW, &policy()), Err(DecodeError::NotNumeric(_))));
        assert!(matches!(decode(ch, b"NaN", NOW, &policy()), Err(DecodeError::NotFinite(_))));
        assert!(matches!(decode(ch, b"", NOW, &policy()), Err(DecodeError::NotNumeric(_))));
        assert!(matches!(decode(ch, &[0xff, 0xfe], NOW, &policy()), Err(DecodeError::NotUtf8)));
    }

    #[test]
    fn power_missing_fields_default_to_zero() {
        let decoded = decode(Channel::Power, br#"{"voltage": 12.0}"#, NOW, &policy()).unwrap();
        assert_eq!(
            decoded,
            Decoded::Power(PowerReading { voltage: 12.0, current: 0.0, power: 0.0, timestamp: NOW })
        );
    }

    #[test]
    fn power_accepts_numeric_strings() {
        let decoded = decode(Channel::Power, br#"{"voltage":"5.1","current":"120","power":612}"#, NOW, &policy()).unwrap();
        let Decoded::Power(p) = decoded else { panic!("expected power") };
        assert_eq!(p.voltage, 5.1);
        assert_eq!(p.current, 120.0);
        assert_eq!(p.power, 612.0);
    }

    #[test]
    fn power_rejects_malformed_json_and_non_objects() {
        assert!(matches!(decode(Channel::Power, b"{voltage:", NOW, &policy()), Err(DecodeError::Json(_))));
        assert!(matches!(decode(Channel::Power, b"[1,2]", NOW, &policy()), Err(DecodeError::NotAnObject(_))));
    }

    #[test]
    fn spectrum_keeps_bin_order_and_defaults() {
        let payload = br#"{"bins":[{"f":50,"m":0.2},{"f":25,"m":0.9},{"m":0.1}],"peak":25}"#;
        let Decoded::Spectrum(s) = decode(Channel::Spectrum, payload, NOW, &policy()).unwrap() else {
            panic!("expected spectrum")
        };
        assert_eq!(s.fs, 3200.0);
        assert_eq!(s.peak, 25.0);
        assert_eq!(
            s.bins,
            vec![FftBin { f: 50.0, m: 0.2 }, FftBin { f: 25.0, m: 0.9 }, FftBin { f: 0.0, m: 0.1 }]
        );
    }

    #[test]
    fn spectrum_with_empty_bins() {
        let device = DecodePolicy { default_sample_rate: 800.0 };
        let Decoded::Spectrum(s) = decode(Channel::Spectrum, br#"{"fs":0,"bins":[]}"#, NOW, &device).unwrap() else {
            panic!("expected spectrum")
        };
        assert!(s.bins.is_empty());
        assert_eq!(s.fs, 800.0);
        assert_eq!(s.peak, 0.0);
    }

    #[test]
    fn tilt_partial_payload() {
        let Decoded::Tilt(t) = decode(Channel::Tilt, br#"{"pitch":3.5,"z":-9.8,"roll":null}"#, NOW, &policy()).unwrap() else {
            panic!("expected tilt")
        };
        assert_eq!(t, TiltReading { pitch: 3.5, roll: 0.0, x: 0.0, y: 0.0, z: -9.8, timestamp: NOW });
    }
}
