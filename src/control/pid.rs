//! Discrete PID controller for heater duty cycle.
//!
//! Errors larger than [`LINEAR_BAND`] bypass the PID terms entirely and
//! saturate the output; the integrator is re-zeroed when the error comes
//! back into the band so stale accumulation never carries over.
//!
//! The derivative term is *subtracted* from the output.

use log::{debug, warn};

use crate::config::PidGains;

/// Half-width (°C) of the error band in which the PID terms are active.
pub const LINEAR_BAND: f32 = 10.0;

pub const OUTPUT_MIN: f32 = 0.0;
pub const OUTPUT_MAX: f32 = 100.0;

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    set_point: f32,
    error: f32,
    /// Raw integral accumulator (sum of in-band errors).
    integrator: f32,
    integrator_min: f32,
    integrator_max: f32,
    /// Previous in-band error.
    derivator: f32,
    /// Armed by a saturating update; zeroes the integrator on band re-entry.
    reset_pending: bool,
}

impl PidController {
    /// Build a controller whose integrator is bounded so that the integral
    /// *term* stays within `integral_min..=integral_max`.
    ///
    /// The bounds are divided by `Ki` here.  With `Ki == 0` the integral term
    /// is always zero and the bounds apply to the accumulator unscaled.
    pub fn new(gains: PidGains, integral_min: f32, integral_max: f32) -> Self {
        let (lo, hi) = if gains.ki == 0.0 {
            (integral_min, integral_max)
        } else {
            (integral_min / gains.ki, integral_max / gains.ki)
        };

        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            set_point: 0.0,
            error: 0.0,
            integrator: 0.0,
            integrator_min: lo.min(hi),
            integrator_max: lo.max(hi),
            derivator: 0.0,
            reset_pending: false,
        }
    }

    /// Compute the corrective output (0–100) for a measurement.
    pub fn update(&mut self, measured: f32) -> f32 {
        if !measured.is_finite() {
            warn!("PID ignoring non-finite measurement {}", measured);
            return OUTPUT_MIN;
        }

        self.error = self.set_point - measured;

        let output = if self.error > LINEAR_BAND {
            self.reset_pending = true;
            OUTPUT_MAX
        } else if self.error < -LINEAR_BAND {
            self.reset_pending = true;
            OUTPUT_MIN
        } else {
            if self.reset_pending {
                self.integrator = 0.0;
                self.reset_pending = false;
            }

            let p = self.kp * self.error;
            let d = self.kd * (self.error - self.derivator);
            self.derivator = self.error;

            self.integrator += self.error;
            if self.integrator > self.integrator_max {
                self.integrator = self.integrator_max;
            } else if self.integrator < self.integrator_min {
                self.integrator = self.integrator_min;
            }
            let i = self.integrator * self.ki;

            p + i - d
        };

        debug!("PID is {} ({} of {})", output, measured, self.set_point);

        if output.is_nan() {
            OUTPUT_MIN
        } else {
            output.clamp(OUTPUT_MIN, OUTPUT_MAX)
        }
    }

    /// Change the target.  Always clears integrator and derivator, even if
    /// the value is unchanged.
    pub fn set_point(&mut self, set_point: f32) {
        self.set_point = set_point;
        self.integrator = 0.0;
        self.derivator = 0.0;
    }

    pub fn point(&self) -> f32 {
        self.set_point
    }

    /// Error seen by the most recent update.
    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn integrator(&self) -> f32 {
        self.integrator
    }

    pub fn set_integrator(&mut self, integrator: f32) {
        self.integrator = integrator;
    }

    pub fn derivator(&self) -> f32 {
        self.derivator
    }

    pub fn set_derivator(&mut self, derivator: f32) {
        self.derivator = derivator;
    }

    pub fn integrator_bounds(&self) -> (f32, f32) {
        (self.integrator_min, self.integrator_max)
    }

    pub fn kp(&self) -> f32 {
        self.kp
    }

    pub fn set_kp(&mut self, kp: f32) {
        self.kp = kp;
    }

    pub fn ki(&self) -> f32 {
        self.ki
    }

    /// Does not rescale the integrator bounds.
    pub fn set_ki(&mut self, ki: f32) {
        self.ki = ki;
    }

    pub fn kd(&self) -> f32 {
        self.kd
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.kd = kd;
    }
}
