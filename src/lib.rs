//! Thermoloop heater controller library.
//!
//! Closed-loop temperature control for resistive heaters: a PID-driven
//! PWM strategy and a hysteresis on/off strategy, each running on its own
//! thread against board peripherals reached through the traits in
//! [`app::ports`].

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod config;
pub mod control;
pub mod error;
pub mod heater;
pub mod sensors;

pub use error::{ActuatorError, ConfigError, Error, Result, SensorError};
pub use heater::{Heater, HeaterHandle, HeaterState};
