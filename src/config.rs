//! Heater configuration parameters
//!
//! One [`HeaterConfig`] per physical heater.  Missing fields take the
//! defaults below, so a minimal document only needs the channels.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_TEMPERATURE: f32 = 250.0;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 100;
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 1000;
pub const DEFAULT_CURRENT_READOUT_DELAY_SECS: u32 = 60;

/// Configuration of a single heater and its control loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaterConfig {
    /// Name used for the loop thread and log lines
    pub name: String,
    /// Safety ceiling (°C).  Targets at or above are rejected.
    pub max_temperature: f32,
    /// Time between loop iterations (milliseconds)
    pub sample_interval_ms: u32,
    pub thermometer: ThermometerConfig,
    pub strategy: StrategyConfig,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            name: "heater".into(),
            max_temperature: DEFAULT_MAX_TEMPERATURE,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            thermometer: ThermometerConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl HeaterConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            log::warn!("Heater config rejected: {}", e);
            ConfigError::Parse
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_temperature.is_finite() || self.max_temperature <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "max_temperature must be a positive number",
            ));
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be non-zero",
            ));
        }
        if self.thermometer.channel.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "thermometer.channel must be set",
            ));
        }
        match &self.strategy {
            StrategyConfig::Proportional(p) => p.validate(),
            StrategyConfig::Binary(b) => b.validate(),
        }
    }
}

/// Which analog input a heater samples and how to calibrate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermometerConfig {
    /// Calibration table key (e.g. `"ntc3950"`)
    pub sensor_type: String,
    /// ADC channel name
    pub channel: String,
}

impl Default for ThermometerConfig {
    fn default() -> Self {
        Self {
            sensor_type: "ntc3950".into(),
            channel: String::new(),
        }
    }
}

/// Actuation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// PID-driven PWM duty cycle
    Proportional(ProportionalConfig),
    /// Hysteresis on/off via a digital output
    Binary(BinaryConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Proportional(ProportionalConfig::default())
    }
}

/// PID gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.0,
            kd: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProportionalConfig {
    /// PWM channel name
    pub channel: String,
    pub gains: PidGains,
    /// Lower bound of the integral term (before division by Ki)
    pub integral_min: f32,
    /// Upper bound of the integral term (before division by Ki)
    pub integral_max: f32,
    /// Fraction of full power the output may reach, in (0, 1]
    pub max_duty_cycle: f32,
    pub pwm_frequency_hz: u32,
    /// Interval between full-power current readouts (seconds)
    pub current_readout_delay_secs: u32,
}

impl Default for ProportionalConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            gains: PidGains::default(),
            integral_min: 0.0,
            integral_max: 100.0,
            max_duty_cycle: 1.0,
            pwm_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
            current_readout_delay_secs: DEFAULT_CURRENT_READOUT_DELAY_SECS,
        }
    }
}

impl ProportionalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.is_empty() {
            return Err(ConfigError::ValidationFailed("pwm channel must be set"));
        }
        if !(self.max_duty_cycle > 0.0 && self.max_duty_cycle <= 1.0) {
            return Err(ConfigError::ValidationFailed(
                "max_duty_cycle must be in (0, 1]",
            ));
        }
        if self.pwm_frequency_hz == 0 {
            return Err(ConfigError::ValidationFailed(
                "pwm_frequency_hz must be non-zero",
            ));
        }
        let g = self.gains;
        if !(g.kp.is_finite() && g.ki.is_finite() && g.kd.is_finite()) {
            return Err(ConfigError::ValidationFailed("PID gains must be finite"));
        }
        if self.integral_min > self.integral_max {
            return Err(ConfigError::ValidationFailed(
                "integral_min must not exceed integral_max",
            ));
        }
        Ok(())
    }
}

/// Electrical level that means "heater on"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryConfig {
    /// Dead-band below the target (°C) before switching back on
    pub hysteresis: f32,
    pub polarity: Polarity,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            hysteresis: 0.0,
            polarity: Polarity::ActiveHigh,
        }
    }
}

impl BinaryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hysteresis.is_finite() || self.hysteresis < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "hysteresis must be a non-negative number",
            ));
        }
        Ok(())
    }
}
