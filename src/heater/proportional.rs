//! PWM heater driven by the PID controller.
//!
//! ## Output contract
//!
//! Each iteration writes exactly one regular duty cycle:
//! `min(clamp(pid, 0, 100), max_duty_cycle * 100)`, or 0 while the sampled
//! temperature is at or above the ceiling.
//!
//! ## Current readout
//!
//! With a [`CurrentSense`] attached, every `current_readout_delay` the
//! output is briefly driven to its duty cap so the supply current can be
//! sampled, then the regular duty is written in the same iteration.  The
//! readout is skipped while over the ceiling.

use std::time::Duration;

use log::{error, info, warn};

use crate::app::ports::{CurrentSense, PwmDriver};
use crate::bus::SharedBus;
use crate::config::ProportionalConfig;
use crate::control::pid::{OUTPUT_MAX, OUTPUT_MIN, PidController};
use crate::error::ActuatorError;

use super::{Actuation, HeaterState, Sample};

pub struct ProportionalHeater<P: PwmDriver> {
    pwm: SharedBus<P>,
    channel: String,
    pid: PidController,
    /// Fraction of full power, in (0, 1]
    max_duty_cycle: f32,
    current_sense: Option<Box<dyn CurrentSense + Send>>,
    current_readout_delay: Duration,
    since_current_readout: Duration,
    /// Target revision last pushed into the PID set-point.
    applied_revision: Option<u64>,
    over_temperature: bool,
    released: bool,
}

impl<P: PwmDriver> ProportionalHeater<P> {
    /// Start the PWM channel at 0 % and take ownership of it.
    pub fn new(pwm: SharedBus<P>, config: &ProportionalConfig) -> Result<Self, ActuatorError> {
        pwm.with(|d| d.start(&config.channel, 0.0, config.pwm_frequency_hz))?;
        info!(
            "PWM {} started at {} Hz (cap {}%)",
            config.channel,
            config.pwm_frequency_hz,
            config.max_duty_cycle * 100.0
        );

        Ok(Self {
            pwm,
            channel: config.channel.clone(),
            pid: PidController::new(config.gains, config.integral_min, config.integral_max),
            max_duty_cycle: config.max_duty_cycle,
            current_sense: None,
            current_readout_delay: Duration::from_secs(u64::from(
                config.current_readout_delay_secs,
            )),
            since_current_readout: Duration::ZERO,
            applied_revision: None,
            over_temperature: false,
            released: false,
        })
    }

    pub fn with_current_sense(mut self, sense: impl CurrentSense + Send + 'static) -> Self {
        self.current_sense = Some(Box::new(sense));
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Highest duty cycle (0–100) this heater will ever write.
    pub fn duty_limit(&self) -> f32 {
        self.max_duty_cycle * OUTPUT_MAX
    }

    fn write_duty(&self, duty: f32) -> Result<(), ActuatorError> {
        self.pwm.with(|d| d.set_duty_cycle(&self.channel, duty))
    }

    fn read_current_if_due(
        &mut self,
        sample: &Sample,
        over_ceiling: bool,
        state: &HeaterState,
    ) -> Result<(), ActuatorError> {
        let Some(sense) = self.current_sense.as_mut() else {
            return Ok(());
        };

        if self.since_current_readout <= self.current_readout_delay {
            self.since_current_readout += sample.elapsed;
            return Ok(());
        }
        self.since_current_readout = Duration::ZERO;

        if over_ceiling {
            warn!("PWM {}: current readout skipped above ceiling", self.channel);
            return Ok(());
        }

        let full_power = self.max_duty_cycle * OUTPUT_MAX;
        self.pwm.with(|d| d.set_duty_cycle(&self.channel, full_power))?;
        match sense.read_current() {
            Ok(amps) => state.set_current_consumption(amps),
            Err(e) => warn!("PWM {}: current readout failed: {}", self.channel, e),
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.pwm.with(|d| {
            if let Err(e) = d.set_duty_cycle(&self.channel, 0.0) {
                warn!("PWM {}: zeroing on release failed: {}", self.channel, e);
            }
            if let Err(e) = d.stop(&self.channel) {
                error!("PWM {}: stop failed: {}", self.channel, e);
            }
        });
        info!("PWM {} released", self.channel);
    }
}

impl<P: PwmDriver + Send> Actuation for ProportionalHeater<P> {
    fn update(&mut self, sample: &Sample, state: &HeaterState) -> Result<(), ActuatorError> {
        if self.applied_revision != Some(sample.target_revision) {
            self.pid.set_point(sample.target);
            self.applied_revision = Some(sample.target_revision);
        }

        let demanded = self.pid.update(sample.temperature);

        let over_ceiling = sample.temperature >= state.max_temperature();
        if over_ceiling && !self.over_temperature {
            warn!(
                "PWM {}: {}°C at or above ceiling {}°C, output forced off",
                self.channel,
                sample.temperature,
                state.max_temperature()
            );
        }
        self.over_temperature = over_ceiling;

        self.read_current_if_due(sample, over_ceiling, state)?;

        let duty = if over_ceiling {
            OUTPUT_MIN
        } else {
            demanded.clamp(OUTPUT_MIN, OUTPUT_MAX).min(self.duty_limit())
        };
        self.write_duty(duty)?;
        state.set_duty_cycle(duty);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.release();
    }
}

impl<P: PwmDriver> Drop for ProportionalHeater<P> {
    fn drop(&mut self) {
        self.release();
    }
}
