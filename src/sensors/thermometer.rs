//! Calibrated thermometer on a shared ADC bus.
//!
//! The analog front end returns a stale value on the first conversion
//! after a channel switch, so every sample is a discard-then-read pair
//! taken under one bus lock.  I/O errors are retried: quietly for the
//! first [`WARN_AFTER_FAILURES`], loudly after that, and surfaced to the
//! caller once more than [`MAX_FAILURES`] consecutive attempts failed.

use std::io;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::app::ports::{AnalogInput, Calibration, TemperatureSource};
use crate::bus::SharedBus;
use crate::config::ThermometerConfig;
use crate::error::SensorError;

/// Consecutive failures tolerated before each retry is logged as a warning.
pub const WARN_AFTER_FAILURES: u32 = 10;
/// Consecutive failures tolerated before the read is abandoned.
pub const MAX_FAILURES: u32 = 100;

pub struct Thermometer<A, C> {
    sensor_type: String,
    channel: String,
    adc: SharedBus<A>,
    calibration: Arc<C>,
}

impl<A: AnalogInput, C: Calibration> Thermometer<A, C> {
    pub fn new(
        sensor_type: impl Into<String>,
        channel: impl Into<String>,
        adc: SharedBus<A>,
        calibration: Arc<C>,
    ) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            channel: channel.into(),
            adc,
            calibration,
        }
    }

    pub fn from_config(config: &ThermometerConfig, adc: SharedBus<A>, calibration: Arc<C>) -> Self {
        Self::new(
            config.sensor_type.clone(),
            config.channel.clone(),
            adc,
            calibration,
        )
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    /// Raw normalised sample, with the retry policy applied.
    pub fn read_raw(&self) -> Result<f32, SensorError> {
        let mut failures = 0u32;
        loop {
            match self.sample_once() {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    failures += 1;
                    if failures > MAX_FAILURES {
                        error!(
                            "ADC {}: giving up after {} failed reads: {}",
                            self.channel, failures, e
                        );
                        return Err(SensorError::RetriesExhausted {
                            attempts: failures,
                            kind: e.kind(),
                        });
                    }
                    if failures > WARN_AFTER_FAILURES {
                        warn!("Error reading value on {}: {}", self.channel, e);
                    } else {
                        debug!("ADC {} read failed ({}), retrying", self.channel, e);
                    }
                }
            }
        }
    }

    /// One discard-then-read pair.  The bus is released between attempts
    /// so sibling thermometers are not starved by a failing channel.
    fn sample_once(&self) -> io::Result<f32> {
        let mut adc = self.adc.lock();
        adc.read(&self.channel)?;
        adc.read(&self.channel)
    }
}

impl<A: AnalogInput, C: Calibration> TemperatureSource for Thermometer<A, C> {
    fn read(&self) -> Result<f32, SensorError> {
        let raw = self.read_raw()?;
        self.calibration.resolve(&self.sensor_type, raw)
    }
}
