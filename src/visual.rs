//! ==============================================================================
//! visual.rs - presentation helpers
//! ==============================================================================
//!
//! purpose:
//!     the small bits of math and formatting the dashboard front ends share:
//!     the heat overlay that tints the 3d motor model from t1, and the unit
//!     formatting used on the status page.
//!
//! heat overlay:
//!
//! ```text
//!     normalized         = clamp((t - cool) / (hot - cool), 0, 1)
//!     blend_strength     = normalized * 0.95   (lerp toward red)
//!     emissive_intensity = normalized * 2.0    (glow)
//! ```
//!
//! ==============================================================================

use serde::Serialize;

const MAX_BLEND: f64 = 0.95;
const MAX_EMISSIVE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatOverlay {
    pub normalized: f64,
    pub blend_strength: f64,
    pub emissive_intensity: f64,
}

impl HeatOverlay {
    /// `None` for non-finite temperatures or a degenerate threshold range
    pub fn for_temperature(temp: f64, cool: f64, hot: f64) -> Option<Self> {
        if !temp.is_finite() || !(hot > cool) {
            return None;
        }
        let normalized = ((temp - cool) / (hot - cool)).clamp(0.0, 1.0);
        Some(Self {
            normalized,
            blend_strength: normalized * MAX_BLEND,
            emissive_intensity: normalized * MAX_EMISSIVE,
        })
    }
}

pub fn format_temperature(temp: f64) -> String {
    format!("{:.2}°C", temp)
}

/// mW below 1000, W above
pub fn format_power(power_mw: f64) -> String {
    if power_mw >= 1000.0 {
        format!("{:.2} W", power_mw / 1000.0)
    } else {
        format!("{:.2} mW", power_mw)
    }
}

/// mA below 1000, A above
pub fn format_current(current_ma: f64) -> String {
    if current_ma >= 1000.0 {
        format!("{:.2} A", current_ma / 1000.0)
    } else {
        format!("{:.2} mA", current_ma)
    }
}

pub fn format_voltage(voltage: f64) -> String {
    format!("{:.2} V", voltage)
}

/// Wh below 1000, kWh above
pub fn format_energy(energy_wh: f64) -> String {
    if energy_wh >= 1000.0 {
        format!("{:.3} kWh", energy_wh / 1000.0)
    } else {
        format!("{:.3} Wh", energy_wh)
    }
}

pub fn format_frequency(freq: f64) -> String {
    format!("{:.1} Hz", freq)
}

pub fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

pub fn temperature_status(temp: f64) -> &'static str {
    if temp >= 40.0 {
        "Hot"
    } else if temp >= 30.0 {
        "Warm"
    } else {
        "Normal"
    }
}
