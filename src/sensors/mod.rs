//! Temperature sensing: the bus-sharing [`Thermometer`] and a Beta-model
//! [`BetaCalibration`] for NTC thermistors.

pub mod thermistor;
pub mod thermometer;

pub use thermistor::{BetaCalibration, BetaModel};
pub use thermometer::Thermometer;
