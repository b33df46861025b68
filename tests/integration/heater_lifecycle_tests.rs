//! Integration tests for the thermometer → PID → PWM control loop.
//!
//! Each heater runs on its own thread against the mock ADC and PWM; the
//! tests observe it only through the handle and the recorded bus traffic.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thermoloop::bus::SharedBus;
use thermoloop::config::{HeaterConfig, ProportionalConfig, StrategyConfig};
use thermoloop::heater::{Heater, HeaterHandle, ProportionalHeater};
use thermoloop::sensors::Thermometer;

use crate::mock_hw::{FixedCurrent, LinearCalibration, MockAdc, MockPwm, PwmCall, raw_for};

const INTERVAL: Duration = Duration::from_millis(5);

fn wait_until(deadline: Duration, f: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    f()
}

struct Rig {
    adc: SharedBus<MockAdc>,
    pwm: SharedBus<MockPwm>,
}

impl Rig {
    fn new() -> Self {
        Self {
            adc: SharedBus::new(MockAdc::new()),
            pwm: SharedBus::new(MockPwm::new()),
        }
    }

    fn set_temperature(&self, channel: &str, celsius: f32) {
        self.adc.with(|a| a.set(channel, raw_for(celsius)));
    }

    fn heater(
        &self,
        name: &str,
        adc_channel: &str,
        pwm_channel: &str,
        max_temperature: f32,
    ) -> Heater<Thermometer<MockAdc, LinearCalibration>, ProportionalHeater<MockPwm>> {
        let thermometer = Thermometer::new(
            "linear",
            adc_channel,
            self.adc.clone(),
            Arc::new(LinearCalibration),
        );
        let config = ProportionalConfig {
            channel: pwm_channel.into(),
            ..ProportionalConfig::default()
        };
        let output = ProportionalHeater::new(self.pwm.clone(), &config).unwrap();
        Heater::new(name, thermometer, output, Some(max_temperature)).with_sample_interval(INTERVAL)
    }
}

fn has_duty(rig: &Rig, channel: &str, duty: f32) -> bool {
    rig.pwm
        .with(|p| p.last_duty(channel))
        .is_some_and(|d| (d - duty).abs() < 1e-3)
}

#[test]
fn cold_heater_runs_at_full_power() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 20.0);
    let heater = rig.heater("extruder", "AIN0", "P9_14", 250.0);
    heater.set_temperature(200.0);
    let handle = heater.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || has_duty(&rig, "P9_14", 100.0)));
    assert!(wait_until(Duration::from_secs(2), || handle.duty_cycle() == 100.0));
    assert!((handle.temperature() - 20.0).abs() < 1e-3);
    assert!(handle.is_active());
}

#[test]
fn stop_releases_output_within_one_interval() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 20.0);
    let heater = rig
        .heater("bed", "AIN0", "P9_14", 250.0)
        .with_sample_interval(Duration::from_millis(50));
    heater.set_temperature(60.0);
    let handle = heater.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || has_duty(&rig, "P9_14", 100.0)));

    let state = handle.state();
    let started = Instant::now();
    handle.shutdown();
    assert!(started.elapsed() < Duration::from_millis(500));

    assert!(!state.is_active());
    assert_eq!(state.duty_cycle(), 0.0);
    rig.pwm.with(|p| {
        assert_eq!(p.stop_count("P9_14"), 1, "channel must be stopped exactly once");
        let history = p.history("P9_14");
        assert_eq!(history[history.len() - 2..], [PwmCall::Set(0.0), PwmCall::Stop]);
    });
}

#[test]
fn sensor_fault_stops_loop_and_zeroes_output() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 20.0);
    let heater = rig.heater("hotend", "AIN0", "P9_14", 250.0);
    heater.set_temperature(200.0);
    let handle = heater.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || has_duty(&rig, "P9_14", 100.0)));

    rig.adc.with(MockAdc::fail);
    assert!(wait_until(Duration::from_secs(5), || !handle.is_active()));

    assert_eq!(handle.duty_cycle(), 0.0);
    rig.pwm.with(|p| {
        assert_eq!(p.last_duty("P9_14"), Some(0.0));
        assert_eq!(p.history("P9_14").last(), Some(&PwmCall::Stop));
    });

    // Dropping a handle whose loop already exited must not release twice.
    drop(handle);
    assert_eq!(rig.pwm.with(|p| p.stop_count("P9_14")), 1);
}

#[test]
fn over_ceiling_forces_zero_duty() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 160.0);
    let heater = rig.heater("bed", "AIN0", "P9_14", 150.0);
    heater.set_temperature(140.0);
    let handle = heater.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || rig
        .pwm
        .with(|p| p.history("P9_14").len() >= 4)));
    rig.pwm.with(|p| {
        assert!(
            p.history("P9_14")
                .iter()
                .all(|c| !matches!(c, PwmCall::Set(d) if *d > 0.0)),
            "no positive duty may be written above the ceiling"
        );
    });
    assert!(handle.is_active());
}

#[test]
fn runtime_target_changes_respect_ceiling() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 95.0);
    let heater = rig.heater("bed", "AIN0", "P9_14", 120.0);
    heater.set_temperature(100.0);
    let handle = heater.start().unwrap();

    handle.set_temperature(130.0);
    assert_eq!(handle.get_set_temperature(), 100.0);

    handle.set_temperature(90.0);
    assert_eq!(handle.get_set_temperature(), 90.0);

    // 95 °C against a 90 °C target drives the output to zero.
    assert!(wait_until(Duration::from_secs(2), || has_duty(&rig, "P9_14", 0.0)
        && handle.duty_cycle() == 0.0));
}

#[test]
fn heaters_share_buses_independently() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 20.0);
    rig.set_temperature("AIN1", 300.0);

    let extruder = rig.heater("extruder", "AIN0", "P9_14", 250.0);
    extruder.set_temperature(200.0);
    let bed = rig.heater("bed", "AIN1", "P9_16", 250.0);
    bed.set_temperature(100.0);

    let handles: Vec<HeaterHandle> = vec![extruder.start().unwrap(), bed.start().unwrap()];

    assert!(wait_until(Duration::from_secs(2), || has_duty(&rig, "P9_14", 100.0)
        && has_duty(&rig, "P9_16", 0.0)));
    assert!((handles[1].temperature() - 300.0).abs() < 1e-2);

    // Stopping one heater leaves the other running.
    let mut handles = handles.into_iter();
    let extruder = handles.next().unwrap();
    let bed = handles.next().unwrap();
    bed.shutdown();
    assert!(extruder.is_active());
    assert_eq!(rig.pwm.with(|p| p.stop_count("P9_16")), 1);
    assert_eq!(rig.pwm.with(|p| p.stop_count("P9_14")), 0);

    extruder.shutdown();
    assert_eq!(rig.pwm.with(|p| p.stop_count("P9_14")), 1);
}

#[test]
fn current_readout_reaches_observers() {
    let rig = Rig::new();
    rig.set_temperature("AIN0", 50.0);
    let thermometer = Thermometer::new("linear", "AIN0", rig.adc.clone(), Arc::new(LinearCalibration));
    let config = ProportionalConfig {
        channel: "P9_14".into(),
        current_readout_delay_secs: 0,
        ..ProportionalConfig::default()
    };
    let output = ProportionalHeater::new(rig.pwm.clone(), &config)
        .unwrap()
        .with_current_sense(FixedCurrent(1.5));
    let heater = Heater::new("bed", thermometer, output, None).with_sample_interval(INTERVAL);
    heater.set_temperature(55.0);
    let handle = heater.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || handle.current_consumption() == 1.5));
}

#[test]
fn heater_builds_from_json_config() {
    let json = r#"{
        "name": "extruder",
        "max_temperature": 260.0,
        "sample_interval_ms": 5,
        "thermometer": { "sensor_type": "linear", "channel": "AIN2" },
        "strategy": {
            "kind": "proportional",
            "channel": "P8_13",
            "max_duty_cycle": 0.6,
            "pwm_frequency_hz": 500
        }
    }"#;
    let config = HeaterConfig::from_json(json).unwrap();
    let StrategyConfig::Proportional(pwm_config) = &config.strategy else {
        panic!("expected proportional strategy");
    };

    let rig = Rig::new();
    rig.set_temperature("AIN2", 25.0);
    let thermometer = Thermometer::from_config(&config.thermometer, rig.adc.clone(), Arc::new(LinearCalibration));
    let output = ProportionalHeater::new(rig.pwm.clone(), pwm_config).unwrap();
    let heater = Heater::from_config(&config, thermometer, output);
    assert_eq!(heater.name(), "extruder");
    heater.set_temperature(255.0);
    let handle = heater.start().unwrap();

    assert_eq!(handle.max_temperature(), 260.0);
    assert!(wait_until(Duration::from_secs(2), || has_duty(&rig, "P8_13", 60.0)));
    assert_eq!(
        rig.pwm.with(|p| p.history("P8_13")[0].clone()),
        PwmCall::Start { duty: 0.0, hz: 500 }
    );
}
