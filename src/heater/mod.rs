//! Heater control loops.
//!
//! A [`Heater`] pairs a [`TemperatureSource`] with an [`Actuation`]
//! strategy.  [`Heater::start`] moves both onto a dedicated thread and
//! returns a [`HeaterHandle`]:
//!
//! ```text
//!   Created ──start()──▶ Running ──stop() / fault──▶ Stopped
//!                           │
//!                 read ─▶ update ─▶ sleep(sample_interval)
//! ```
//!
//! Whatever ends the loop (stop request, sensor or actuator error, panic),
//! the strategy's [`Actuation::cleanup`] runs once on the loop thread
//! before the state is marked inactive.  Dropping the handle stops and joins the loop.

pub mod binary;
pub mod proportional;
pub mod task;

pub use binary::BinaryHeater;
pub use proportional::ProportionalHeater;

use core::ops::Deref;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};

use crate::app::ports::TemperatureSource;
use crate::config::{DEFAULT_MAX_TEMPERATURE, DEFAULT_SAMPLE_INTERVAL_MS, HeaterConfig};
use crate::error::ActuatorError;

/// Loop thread stack size.
const HEATER_STACK_KB: usize = 64;

// ───────────────────────────────────────────────────────────────
// Actuation strategy
// ───────────────────────────────────────────────────────────────

/// One loop iteration's view of the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Freshly sampled temperature (°C)
    pub temperature: f32,
    /// Currently accepted target (°C)
    pub target: f32,
    /// Bumped on every `set_temperature` call, accepted or not
    pub target_revision: u64,
    /// Nominal time between iterations (the configured sample interval)
    pub elapsed: Duration,
}

/// The decision-and-drive step of a heater.
pub trait Actuation: Send {
    /// Decide on an output for `sample` and drive the hardware.  Publishes
    /// the resulting output through `state`.
    fn update(&mut self, sample: &Sample, state: &HeaterState) -> Result<(), ActuatorError>;

    /// Force the output inactive and release the peripheral.  Idempotent.
    fn cleanup(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Shared observable state
// ───────────────────────────────────────────────────────────────

/// `f32` stored as raw bits.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// State shared between a loop thread and its observers.
///
/// Writes from other threads are picked up on a later iteration; there
/// is no ordering guarantee beyond that.
#[derive(Debug)]
pub struct HeaterState {
    max_temperature: f32,
    target: AtomicF32,
    target_revision: AtomicU64,
    temperature: AtomicF32,
    duty_cycle: AtomicF32,
    is_on: AtomicBool,
    current_consumption: AtomicF32,
    active: AtomicBool,
}

impl HeaterState {
    pub fn new(max_temperature: f32) -> Self {
        Self {
            max_temperature,
            target: AtomicF32::new(0.0),
            target_revision: AtomicU64::new(0),
            temperature: AtomicF32::new(0.0),
            duty_cycle: AtomicF32::new(0.0),
            is_on: AtomicBool::new(false),
            current_consumption: AtomicF32::new(0.0),
            active: AtomicBool::new(false),
        }
    }

    /// Request a new target.  Values at or above the ceiling are ignored
    /// and the previous target is kept.
    pub fn set_temperature(&self, temperature: f32) {
        if temperature < self.max_temperature {
            self.target.store(temperature);
        } else {
            warn!("Temperature {} too high, got ignored", temperature);
        }
        self.target_revision.fetch_add(1, Ordering::Release);
    }

    pub fn get_set_temperature(&self) -> f32 {
        self.target.load()
    }

    pub fn max_temperature(&self) -> f32 {
        self.max_temperature
    }

    /// Last sampled temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature.load()
    }

    /// Duty cycle (0–100) most recently written to a PWM output.
    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle.load()
    }

    /// Logical state of an on/off output.
    pub fn is_on(&self) -> bool {
        self.is_on.load(Ordering::Relaxed)
    }

    /// Supply current (A) from the last full-power readout.
    pub fn current_consumption(&self) -> f32 {
        self.current_consumption.load()
    }

    /// `false` once the loop has exited, whether stopped or faulted.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn set_duty_cycle(&self, duty: f32) {
        self.duty_cycle.store(duty);
    }

    pub(crate) fn set_is_on(&self, on: bool) {
        self.is_on.store(on, Ordering::Relaxed);
    }

    pub(crate) fn set_current_consumption(&self, amps: f32) {
        self.current_consumption.store(amps);
    }

    fn snapshot(&self, temperature: f32, elapsed: Duration) -> Sample {
        let target_revision = self.target_revision.load(Ordering::Acquire);
        Sample {
            temperature,
            target: self.target.load(),
            target_revision,
            elapsed,
        }
    }

    /// Observers seeing `is_active() == false` also see the zeroed output.
    fn mark_stopped(&self) {
        self.duty_cycle.store(0.0);
        self.is_on.store(false, Ordering::Relaxed);
        self.active.store(false, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Heater (created, not yet running)
// ───────────────────────────────────────────────────────────────

pub struct Heater<S, A> {
    name: String,
    sensor: S,
    actuation: A,
    state: Arc<HeaterState>,
    sample_interval: Duration,
}

impl<S, A> Heater<S, A>
where
    S: TemperatureSource + Send + 'static,
    A: Actuation + 'static,
{
    /// `max_temperature` defaults to 250 °C when `None`.
    pub fn new(
        name: impl Into<String>,
        sensor: S,
        actuation: A,
        max_temperature: Option<f32>,
    ) -> Self {
        Self {
            name: name.into(),
            sensor,
            actuation,
            state: Arc::new(HeaterState::new(
                max_temperature.unwrap_or(DEFAULT_MAX_TEMPERATURE),
            )),
            sample_interval: Duration::from_millis(u64::from(DEFAULT_SAMPLE_INTERVAL_MS)),
        }
    }

    pub fn from_config(config: &HeaterConfig, sensor: S, actuation: A) -> Self {
        Self::new(
            config.name.clone(),
            sensor,
            actuation,
            Some(config.max_temperature),
        )
        .with_sample_interval(Duration::from_millis(u64::from(config.sample_interval_ms)))
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the initial target before the loop starts.
    pub fn set_temperature(&self, temperature: f32) {
        self.state.set_temperature(temperature);
    }

    /// Spawn the control loop.
    ///
    /// If the thread cannot be spawned the strategy is dropped, which
    /// releases its output.
    pub fn start(self) -> io::Result<HeaterHandle> {
        let name = self.name.clone();
        let state = Arc::clone(&self.state);

        state.active.store(true, Ordering::Release);
        let spawned = task::spawn_named(&name, HEATER_STACK_KB, move || self.run());

        match spawned {
            Ok(thread) => Ok(HeaterHandle {
                name,
                state,
                thread: Some(thread),
            }),
            Err(e) => {
                state.mark_stopped();
                error!("Heater {}: failed to spawn control loop: {}", name, e);
                Err(e)
            }
        }
    }

    fn run(self) {
        let Self {
            name,
            sensor,
            mut actuation,
            state,
            sample_interval,
        } = self;

        info!("Heater {} running (max {}°C)", name, state.max_temperature());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            control_loop(&sensor, &mut actuation, &state, sample_interval)
        }));
        match outcome {
            Ok(Ok(())) => info!("Heater {} stopped", name),
            Ok(Err(e)) => error!("Heater {} thread crashed: {:#}", name, e),
            Err(_) => error!("Heater {} thread panicked", name),
        }

        // Marks the state stopped even if `cleanup` itself panics.
        let _stopped = StopGuard(&state);
        actuation.cleanup();
    }
}

/// Runs [`HeaterState::mark_stopped`] on drop, including during unwinding.
struct StopGuard<'a>(&'a HeaterState);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

fn control_loop<S, A>(
    sensor: &S,
    actuation: &mut A,
    state: &HeaterState,
    interval: Duration,
) -> anyhow::Result<()>
where
    S: TemperatureSource,
    A: Actuation,
{
    while state.is_active() {
        let temperature = sensor.read().context("reading temperature")?;
        state.temperature.store(temperature);

        let sample = state.snapshot(temperature, interval);
        actuation
            .update(&sample, state)
            .context("driving heater output")?;

        thread::sleep(interval);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Running heater
// ───────────────────────────────────────────────────────────────

/// Owner of a running control loop.
///
/// Dereferences to [`HeaterState`] for targets and observables.
pub struct HeaterHandle {
    name: String,
    state: Arc<HeaterState>,
    thread: Option<JoinHandle<()>>,
}

impl HeaterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared state, for observers that outlive the handle.
    pub fn state(&self) -> Arc<HeaterState> {
        Arc::clone(&self.state)
    }

    /// Stop the loop and wait for the output to be released.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.state.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Heater {}: loop thread could not be joined", self.name);
            }
        }
    }
}

impl Deref for HeaterHandle {
    type Target = HeaterState;

    fn deref(&self) -> &HeaterState {
        &self.state
    }
}

impl Drop for HeaterHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
