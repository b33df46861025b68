//! Port traits: the boundary between the control loops and the board.
//!
//! ```text
//!   Peripheral driver ──▶ Port trait ──▶ Thermometer / Heater (domain)
//! ```
//!
//! Driver adapters implement these traits; the domain consumes them via
//! generics and never touches a peripheral directly.  Drivers are assumed
//! unsafe for concurrent calls on the same bus, so every implementation is
//! reached through a [`SharedBus`](crate::bus::SharedBus).
//!
//! On/off heaters take any [`embedded_hal::digital::OutputPin`] instead of
//! a port trait here.

use std::io;

use crate::error::{ActuatorError, SensorError};

// ───────────────────────────────────────────────────────────────
// Analog input (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw analog sampling, keyed by channel name (e.g. `"P9_39"`).
pub trait AnalogInput {
    /// Sample the channel.  Returns a normalised value in `0.0..=1.0`.
    ///
    /// I/O errors are treated as transient by the caller and retried.
    fn read(&mut self, channel: &str) -> io::Result<f32>;
}

// ───────────────────────────────────────────────────────────────
// PWM (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Pulse-width modulation primitives, keyed by channel name.
///
/// Duty cycles are percentages in `0.0..=100.0`.
pub trait PwmDriver {
    /// Begin generating on `channel` at `duty` percent and `frequency_hz`.
    fn start(&mut self, channel: &str, duty: f32, frequency_hz: u32)
    -> Result<(), ActuatorError>;

    /// Change the duty cycle of a running channel.
    fn set_duty_cycle(&mut self, channel: &str, duty: f32) -> Result<(), ActuatorError>;

    /// Stop generation on `channel`.
    fn stop(&mut self, channel: &str) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Calibration
// ───────────────────────────────────────────────────────────────

/// Converts a raw analog sample to degrees Celsius for a sensor type.
pub trait Calibration {
    fn resolve(&self, sensor_type: &str, raw: f32) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Temperature source (what a control loop samples)
// ───────────────────────────────────────────────────────────────

/// A blocking, calibrated temperature reading.
///
/// An `Err` means the fault is unrecoverable for the caller; transient
/// faults are expected to be retried inside the implementation.
pub trait TemperatureSource {
    fn read(&self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Current sense
// ───────────────────────────────────────────────────────────────

/// Heater supply current measurement, in amperes.
///
/// Only meaningful while the output is driven at full duty.
pub trait CurrentSense {
    fn read_current(&mut self) -> Result<f32, SensorError>;
}
