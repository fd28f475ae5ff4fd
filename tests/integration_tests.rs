/*
 * Integration tests for Thermofan
 *
 * These tests drive real module boundaries together: config files on disk,
 * the controller policy, and the hwmon collaborators against a fake sysfs
 * tree.
 */

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::{NamedTempFile, TempDir};

use thermofan::config::{
    config_path, load_config_from, validate_config, DaemonConfig, PwmSpec, SensorSpec,
};
use thermofan::controller::{ControllerConfig, ThermalController};
use thermofan::hwmon::{HwmonSensor, PwmDrive};
use thermofan::ports::{DriveOutput, TemperatureSensor};
use thermofan::service::{ControlService, LogStatusSink};

fn fake_hwmon_tree() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("sys/class/hwmon");

    let hwmon0 = root.join("hwmon0");
    fs::create_dir_all(&hwmon0).unwrap();
    fs::write(hwmon0.join("name"), "coretemp").unwrap();
    fs::write(hwmon0.join("temp1_input"), "45500").unwrap();

    let hwmon1 = root.join("hwmon1");
    fs::create_dir_all(&hwmon1).unwrap();
    fs::write(hwmon1.join("name"), "nct6775").unwrap();
    fs::write(hwmon1.join("pwm1"), "128").unwrap();
    fs::write(hwmon1.join("pwm1_enable"), "2").unwrap();

    temp_dir
}

fn test_config() -> DaemonConfig {
    DaemonConfig {
        controller: ControllerConfig {
            on_threshold_c: 85.0,
            max_threshold_c: 95.0,
            hysteresis_c: 5.0,
            min_drive: 100.0,
            max_drive: 255.0,
        },
        sensor: SensorSpec { chip: "coretemp".into(), temp_idx: 1 },
        pwm: PwmSpec { chip: "nct6775".into(), pwm_idx: 1 },
        relay_path: None,
        poll_interval_ms: 1000,
        sensor_min_c: -20.0,
        sensor_max_c: 120.0,
        failsafe_drive: None,
        write_min_delta: 2.0,
    }
}

#[test]
fn test_config_file_roundtrip() {
    let cfg = test_config();
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(serde_json::to_string_pretty(&cfg).unwrap().as_bytes())
        .unwrap();
    tmp.flush().unwrap();

    let loaded = load_config_from(tmp.path()).unwrap();
    assert!(validate_config(&loaded).is_ok());
    assert_eq!(loaded.sensor.chip, "coretemp");
    assert_eq!(loaded.controller.min_drive, 100.0);
    assert_eq!(loaded.failsafe_drive(), 127.5);
}

#[test]
fn test_config_rejects_inverted_thresholds() {
    let mut cfg = test_config();
    cfg.controller.on_threshold_c = 96.0;
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(serde_json::to_string_pretty(&cfg).unwrap().as_bytes())
        .unwrap();
    tmp.flush().unwrap();
    assert!(load_config_from(tmp.path()).is_err());
}

#[test]
fn test_cooling_sequence_through_controller() {
    let mut ctrl = ThermalController::new(test_config().controller);

    let samples = [70.0, 90.0, 96.0, 83.0, 78.0];
    let expected_drive = [0.0, 177.5, 255.0, 100.0, 0.0];
    let expected_relay = [false, true, true, true, false];

    for i in 0..samples.len() {
        let cmd = ctrl.update(samples[i]);
        assert!(
            (cmd.drive - expected_drive[i]).abs() < 1e-9,
            "sample {} -> drive {} (wanted {})",
            samples[i],
            cmd.drive,
            expected_drive[i]
        );
        assert_eq!(cmd.relay_on, expected_relay[i], "sample {}", samples[i]);
    }
}

#[test]
fn test_sensor_to_pwm_pipeline_on_fake_tree() {
    let tree = fake_hwmon_tree();
    let root = tree.path().join("sys/class/hwmon");

    let mut sensor = HwmonSensor::open(&root, "coretemp", 1, -20.0, 120.0).unwrap();
    let mut drive = PwmDrive::open(&root, "nct6775", 1, None).unwrap();
    let mut ctrl = ThermalController::new(test_config().controller);

    // 90C -> proportional band midpoint, rounded at the hardware write.
    let input = root.join("hwmon0/temp1_input");
    fs::write(&input, "90000").unwrap();
    let temp = sensor.read_temp_c().unwrap();
    let cmd = ctrl.update(temp);
    drive.set_drive(cmd.drive).unwrap();

    let pwm = root.join("hwmon1/pwm1");
    assert_eq!(fs::read_to_string(&pwm).unwrap(), "178");
    assert_eq!(fs::read_to_string(root.join("hwmon1/pwm1_enable")).unwrap(), "1");

    // Cooling below the hysteresis band shuts the fan off.
    fs::write(&input, "78000").unwrap();
    let temp = sensor.read_temp_c().unwrap();
    let cmd = ctrl.update(temp);
    drive.set_drive(cmd.drive).unwrap();
    assert_eq!(fs::read_to_string(&pwm).unwrap(), "0");
}

#[test]
fn test_service_ticks_against_fake_tree() {
    let tree = fake_hwmon_tree();
    let root = tree.path().join("sys/class/hwmon");
    let relay = tree.path().join("relay_value");
    fs::write(&relay, "0").unwrap();

    let cfg = {
        let mut c = test_config();
        c.relay_path = Some(relay.clone());
        c
    };
    let sensor = HwmonSensor::open(&root, "coretemp", 1, -20.0, 120.0).unwrap();
    let drive = PwmDrive::open(&root, "nct6775", 1, Some(relay.clone())).unwrap();

    let mut svc = ControlService::new(&cfg, sensor, drive, LogStatusSink);

    let input = root.join("hwmon0/temp1_input");
    let pwm = root.join("hwmon1/pwm1");

    fs::write(&input, "96000").unwrap();
    svc.tick().unwrap();
    assert_eq!(fs::read_to_string(&pwm).unwrap(), "255");
    assert_eq!(fs::read_to_string(&relay).unwrap(), "1");

    fs::write(&input, "70000").unwrap();
    svc.tick().unwrap();
    assert_eq!(fs::read_to_string(&pwm).unwrap(), "0");
    assert_eq!(fs::read_to_string(&relay).unwrap(), "0");
}

#[test]
fn test_service_garbage_sample_holds_last_output() {
    let tree = fake_hwmon_tree();
    let root = tree.path().join("sys/class/hwmon");

    let cfg = test_config();
    let sensor = HwmonSensor::open(&root, "coretemp", 1, -20.0, 120.0).unwrap();
    let drive = PwmDrive::open(&root, "nct6775", 1, None).unwrap();
    let mut svc = ControlService::new(&cfg, sensor, drive, LogStatusSink);

    let input = root.join("hwmon0/temp1_input");
    let pwm = root.join("hwmon1/pwm1");

    fs::write(&input, "90000").unwrap();
    svc.tick().unwrap();
    assert_eq!(fs::read_to_string(&pwm).unwrap(), "178");

    // Sensor held-last-valid papers over the garbage read, drive unchanged.
    fs::write(&input, "garbage").unwrap();
    svc.tick().unwrap();
    assert_eq!(fs::read_to_string(&pwm).unwrap(), "178");
}

#[test]
#[serial]
fn test_config_path_honors_xdg() {
    std::env::set_var("XDG_CONFIG_HOME", "/xdg/test");
    assert_eq!(
        config_path(),
        PathBuf::from("/xdg/test/thermofan/config.json")
    );
    std::env::remove_var("XDG_CONFIG_HOME");
}
