//! NTC thermistor calibration using the Beta equation.
//!
//! Each sensor type is a thermistor in a voltage divider against a fixed
//! resistor, with the thermistor on the low side.  The analog input reports
//! the divider tap as a fraction of the reference voltage.

use std::collections::HashMap;

use crate::app::ports::Calibration;
use crate::error::SensorError;

const KELVIN_OFFSET: f32 = 273.15;
const T25_K: f32 = 298.15;

/// Normalised samples this close to either rail mean an open or shorted sensor.
const RAIL_MARGIN: f32 = 0.003;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaModel {
    /// Resistance at 25 °C (ohms)
    pub r25: f32,
    /// Beta coefficient (K)
    pub beta: f32,
    /// Fixed divider resistor (ohms)
    pub r_divider: f32,
}

impl BetaModel {
    pub fn celsius(&self, raw: f32) -> Result<f32, SensorError> {
        if !(RAIL_MARGIN..=1.0 - RAIL_MARGIN).contains(&raw) {
            return Err(SensorError::OutOfRange);
        }
        let r_ntc = self.r_divider * raw / (1.0 - raw);
        let inv_t = (1.0 / T25_K) + (1.0 / self.beta) * (r_ntc / self.r25).ln();
        if inv_t <= 0.0 {
            return Err(SensorError::OutOfRange);
        }
        Ok((1.0 / inv_t) - KELVIN_OFFSET)
    }
}

/// Calibration lookup keyed by sensor type name.
#[derive(Debug, Clone, Default)]
pub struct BetaCalibration {
    models: HashMap<String, BetaModel>,
}

impl BetaCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Common 10 kΩ/B3950 and 100 kΩ/B4066 thermistors.
    pub fn with_defaults() -> Self {
        let mut c = Self::new();
        c.register(
            "ntc3950",
            BetaModel {
                r25: 10_000.0,
                beta: 3950.0,
                r_divider: 10_000.0,
            },
        );
        c.register(
            "epcos100k",
            BetaModel {
                r25: 100_000.0,
                beta: 4066.0,
                r_divider: 4_700.0,
            },
        );
        c
    }

    pub fn register(&mut self, sensor_type: impl Into<String>, model: BetaModel) {
        self.models.insert(sensor_type.into(), model);
    }
}

impl Calibration for BetaCalibration {
    fn resolve(&self, sensor_type: &str, raw: f32) -> Result<f32, SensorError> {
        self.models
            .get(sensor_type)
            .ok_or(SensorError::UnknownSensorType)?
            .celsius(raw)
    }
}
