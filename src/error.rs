//! Unified error types for the heater controller.
//!
//! Port traits report [`SensorError`] and [`ActuatorError`]; driver
//! adapters construct them and the heater strategies propagate them.
//! [`Error`] and [`Result`] unify the three kinds for callers that wire
//! heaters up from configuration.  The control loop itself wraps faults
//! with `anyhow` context instead.

use core::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A temperature sample could not be obtained.
    Sensor(SensorError),
    /// An output peripheral rejected a command.
    Actuator(ActuatorError),
    /// Configuration is invalid or could not be parsed.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The analog input kept failing past the retry bound.
    RetriesExhausted { attempts: u32, kind: io::ErrorKind },
    /// The calibration lookup has no table for this sensor type.
    UnknownSensorType,
    /// The raw sample cannot be mapped to a physical temperature.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted { attempts, kind } => {
                write!(f, "ADC read failed {attempts} times in a row ({kind})")
            }
            Self::UnknownSensorType => write!(f, "unknown sensor type"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM channel could not be started.
    PwmStartFailed,
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// PWM channel could not be stopped.
    PwmStopFailed,
    /// GPIO level write failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmStartFailed => write!(f, "PWM start failed"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::PwmStopFailed => write!(f, "PWM stop failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Configuration values are rejected, never silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
    /// The document could not be deserialised.
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Parse => write!(f, "malformed configuration"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
