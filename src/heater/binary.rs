//! On/off heater on a digital output, with hysteresis.
//!
//! Switches off as soon as the temperature exceeds the target and back on
//! only once it has dropped below `target - hysteresis`.  The thresholds
//! are deliberately asymmetric: the dead-band lies entirely below the
//! target.  A reading at or above the ceiling, or a non-finite one,
//! forces the output off.
//!
//! Output polarity is resolved to concrete pin levels at construction;
//! release always drives the "off" level.

use embedded_hal::digital::{Error as _, OutputPin, PinState};
use log::{info, warn};

use crate::config::{BinaryConfig, Polarity};
use crate::error::ActuatorError;

use super::{Actuation, HeaterState, Sample};

/// Electrical levels for the two logical states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub on: PinState,
    pub off: PinState,
}

impl From<Polarity> for Levels {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::ActiveHigh => Self {
                on: PinState::High,
                off: PinState::Low,
            },
            Polarity::ActiveLow => Self {
                on: PinState::Low,
                off: PinState::High,
            },
        }
    }
}

pub struct BinaryHeater<P: OutputPin> {
    pin: P,
    levels: Levels,
    hysteresis: f32,
    is_on: bool,
    released: bool,
}

impl<P: OutputPin> BinaryHeater<P> {
    /// Take the pin and drive it to the "off" level.
    pub fn new(pin: P, config: &BinaryConfig) -> Result<Self, ActuatorError> {
        let mut heater = Self {
            pin,
            levels: config.polarity.into(),
            hysteresis: config.hysteresis,
            is_on: false,
            released: false,
        };
        heater.drive(false)?;
        Ok(heater)
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    pub fn levels(&self) -> Levels {
        self.levels
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorError> {
        let level = if on { self.levels.on } else { self.levels.off };
        self.pin.set_state(level).map_err(|e| {
            warn!("GPIO write {:?} failed: {:?}", level, e.kind());
            ActuatorError::GpioWriteFailed
        })?;
        self.is_on = on;
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.drive(false) {
            warn!("GPIO release failed: {}", e);
        }
        info!("GPIO heater output released");
    }
}

impl<P: OutputPin + Send> Actuation for BinaryHeater<P> {
    fn update(&mut self, sample: &Sample, state: &HeaterState) -> Result<(), ActuatorError> {
        if !sample.temperature.is_finite() || sample.temperature >= state.max_temperature() {
            if self.is_on {
                warn!(
                    "{}°C not below ceiling {}°C, output forced off",
                    sample.temperature,
                    state.max_temperature()
                );
                self.drive(false)?;
            }
        } else if self.is_on {
            if sample.temperature > sample.target {
                self.drive(false)?;
            }
        } else if sample.temperature < sample.target - self.hysteresis {
            self.drive(true)?;
        }

        state.set_is_on(self.is_on);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.release();
    }
}

impl<P: OutputPin> Drop for BinaryHeater<P> {
    fn drop(&mut self) {
        self.release();
    }
}
