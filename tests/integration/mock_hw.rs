//! Mock hardware adapters for integration tests.
//!
//! Records every PWM and GPIO write so tests can assert on the full
//! command history without touching real peripherals.

use core::convert::Infallible;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorType, OutputPin, PinState};
use thermoloop::app::ports::{AnalogInput, Calibration, CurrentSense, PwmDriver};
use thermoloop::error::{ActuatorError, SensorError};

// ── ADC ───────────────────────────────────────────────────────

/// Analog input returning a settable value per channel.
#[derive(Default)]
pub struct MockAdc {
    values: HashMap<String, f32>,
    failing: bool,
    pub reads: u64,
}

#[allow(dead_code)]
impl MockAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the normalised value `channel` reports from now on.
    pub fn set(&mut self, channel: &str, raw: f32) {
        self.values.insert(channel.to_owned(), raw);
    }

    /// Make every subsequent read fail with an I/O error.
    pub fn fail(&mut self) {
        self.failing = true;
    }
}

impl AnalogInput for MockAdc {
    fn read(&mut self, channel: &str) -> io::Result<f32> {
        self.reads += 1;
        if self.failing {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "ADC timeout"));
        }
        self.values
            .get(channel)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such channel"))
    }
}

/// Maps the raw `0.0..=1.0` sample linearly onto 0–1000 °C.
pub struct LinearCalibration;

impl Calibration for LinearCalibration {
    fn resolve(&self, sensor_type: &str, raw: f32) -> Result<f32, SensorError> {
        match sensor_type {
            "linear" => Ok(raw * 1000.0),
            _ => Err(SensorError::UnknownSensorType),
        }
    }
}

/// Raw sample that [`LinearCalibration`] maps to `celsius`.
pub fn raw_for(celsius: f32) -> f32 {
    celsius / 1000.0
}

// ── PWM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PwmCall {
    Start { duty: f32, hz: u32 },
    Set(f32),
    Stop,
}

/// PWM driver recording calls per channel.
#[derive(Default)]
pub struct MockPwm {
    pub calls: HashMap<String, Vec<PwmCall>>,
}

#[allow(dead_code)]
impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self, channel: &str) -> &[PwmCall] {
        self.calls.get(channel).map_or(&[], Vec::as_slice)
    }

    pub fn last_duty(&self, channel: &str) -> Option<f32> {
        self.history(channel).iter().rev().find_map(|c| match c {
            PwmCall::Set(d) => Some(*d),
            _ => None,
        })
    }

    pub fn stop_count(&self, channel: &str) -> usize {
        self.history(channel)
            .iter()
            .filter(|c| **c == PwmCall::Stop)
            .count()
    }

    fn push(&mut self, channel: &str, call: PwmCall) {
        self.calls.entry(channel.to_owned()).or_default().push(call);
    }
}

impl PwmDriver for MockPwm {
    fn start(&mut self, channel: &str, duty: f32, frequency_hz: u32) -> Result<(), ActuatorError> {
        self.push(
            channel,
            PwmCall::Start {
                duty,
                hz: frequency_hz,
            },
        );
        Ok(())
    }

    fn set_duty_cycle(&mut self, channel: &str, duty: f32) -> Result<(), ActuatorError> {
        self.push(channel, PwmCall::Set(duty));
        Ok(())
    }

    fn stop(&mut self, channel: &str) -> Result<(), ActuatorError> {
        self.push(channel, PwmCall::Stop);
        Ok(())
    }
}

// ── GPIO ──────────────────────────────────────────────────────

/// Output pin whose level history is visible through clones.
#[derive(Clone, Default)]
pub struct MockPin {
    levels: Arc<Mutex<Vec<PinState>>>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<PinState> {
        self.levels.lock().unwrap().clone()
    }

    pub fn level(&self) -> Option<PinState> {
        self.levels.lock().unwrap().last().copied()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.lock().unwrap().push(PinState::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.lock().unwrap().push(PinState::High);
        Ok(())
    }
}

// ── Current sense ─────────────────────────────────────────────

pub struct FixedCurrent(pub f32);

impl CurrentSense for FixedCurrent {
    fn read_current(&mut self) -> Result<f32, SensorError> {
        Ok(self.0)
    }
}
