//! ==============================================================================
//! energy.rs - cumulative energy integrator
//! ==============================================================================
//!
//! purpose:
//!     integrates power samples over time into a running Wh total using the
//!     left-rectangle rule: each accepted sample is charged for the whole
//!     window since the previous boundary.
//!
//! ```text
//!         elapsed_h = (now - last_update) / 3_600_000
//!         delta_wh  = (power_mw / 1000) * elapsed_h
//! ```
//!
//! idle samples:
//!     power <= 0 (or not finite) adds nothing and, by default, leaves
//!     `last_update` where it was. the next positive sample is then charged
//!     for the idle gap too. `advance_on_idle` moves the boundary forward on
//!     idle samples instead, so idle time is never billed.
//!
//! ```text
//!     a sample stamped before `last_update` contributes zero elapsed time.
//! ```
//!
//! ==============================================================================

use crate::domain::EnergyAccumulator;

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone)]
pub struct EnergyIntegrator {
    acc: EnergyAccumulator,
    advance_on_idle: bool,
}

impl EnergyIntegrator {
    pub fn new(now: u64, advance_on_idle: bool) -> Self {
        Self {
            acc: EnergyAccumulator { total_energy: 0.0, last_update: now },
            advance_on_idle,
        }
    }

    /// apply one power sample (mW) taken at `now`; returns the Wh added
    pub fn integrate(&mut self, power_mw: f64, now: u64) -> Option<f64> {
        if !power_mw.is_finite() || power_mw <= 0.0 {
            if self.advance_on_idle {
                self.acc.last_update = self.acc.last_update.max(now);
            }
            return None;
        }

        let elapsed_hours = now.saturating_sub(self.acc.last_update) as f64 / MS_PER_HOUR;
        let delta_wh = (power_mw / 1000.0) * elapsed_hours;
        self.acc.total_energy += delta_wh;
        self.acc.last_update = self.acc.last_update.max(now);
        Some(delta_wh)
    }

    /// zero the total and restart the window at `now`
    pub fn reset(&mut self, now: u64) {
        self.acc = EnergyAccumulator { total_energy: 0.0, last_update: now };
    }

    pub fn accumulator(&self) -> &EnergyAccumulator {
        &self.acc
    }

    pub fn total_wh(&self) -> f64 {
        self.acc.total_energy
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3_600_000;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_hour_at_six_watts_is_six_wh() {
        let mut e = EnergyIntegrator::new(0, false);
        assert_eq!(e.integrate(6000.0, 0), Some(0.0));
        let delta = e.integrate(6000.0, HOUR).unwrap();
        assert!(close(delta, 6.0));
        assert!(close(e.total_wh(), 6.0));
        assert_eq!(e.accumulator().last_update, HOUR);
    }

    #[test]
    fn sum_of_left_rectangles() {
        let samples = [(1_000.0, 600_000u64), (2_500.0, 900_000), (500.0, 2_700_000), (4_000.0, 3_000_000)];
        let mut e = EnergyIntegrator::new(0, false);
        let mut expected = 0.0;
        let mut last = 0u64;
        for (p, t) in samples {
            e.integrate(p, t);
            expected += (p / 1000.0) * ((t - last) as f64 / HOUR as f64);
            last = t;
        }
        assert!(close(e.total_wh(), expected));
    }

    #[test]
    fn idle_sample_keeps_boundary_by_default() {
        let mut e = EnergyIntegrator::new(0, false);
        e.integrate(1000.0, HOUR);
        assert_eq!(e.integrate(0.0, 2 * HOUR), None);
        assert_eq!(e.accumulator().last_update, HOUR);

        // the idle hour is charged at the resumed rate
        e.integrate(1000.0, 3 * HOUR);
        assert!(close(e.total_wh(), 3.0));
    }

    #[test]
    fn idle_sample_advances_boundary_when_configured() {
        let mut e = EnergyIntegrator::new(0, true);
        e.integrate(1000.0, HOUR);
        e.integrate(0.0, 2 * HOUR);
        assert_eq!(e.accumulator().last_update, 2 * HOUR);

        e.integrate(1000.0, 3 * HOUR);
        assert!(close(e.total_wh(), 2.0));
    }

    #[test]
    fn negative_and_nan_power_are_skipped() {
        let mut e = EnergyIntegrator::new(0, false);
        assert_eq!(e.integrate(-50.0, HOUR), None);
        assert_eq!(e.integrate(f64::NAN, HOUR), None);
        assert_eq!(e.integrate(f64::INFINITY, HOUR), None);
        assert_eq!(e.total_wh(), 0.0);
        assert_eq!(e.accumulator().last_update, 0);
    }

    #[test]
    fn stale_sample_adds_nothing_and_keeps_boundary() {
        let mut e = EnergyIntegrator::new(0, false);
        e.integrate(1000.0, HOUR);
        let before = e.total_wh();
        assert_eq!(e.integrate(1000.0, HOUR / 2), Some(0.0));
        assert_eq!(e.total_wh(), before);
        assert_eq!(e.accumulator().last_update, HOUR);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut e = EnergyIntegrator::new(0, false);
        e.integrate(1000.0, HOUR);
        e.reset(2 * HOUR);
        e.reset(2 * HOUR);
        assert_eq!(e.total_wh(), 0.0);
        assert_eq!(e.accumulator().last_update, 2 * HOUR);

        e.integrate(1000.0, 3 * HOUR);
        assert!(close(e.total_wh(), 1.0));
    }
}
