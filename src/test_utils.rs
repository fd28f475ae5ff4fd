/*
 * Test utilities for Thermofan
 *
 * Shared helpers for building fake sysfs trees and canned configs used
 * across the unit and integration tests.
 */

#[cfg(test)]
pub mod test_utils {
    use crate::config::{DaemonConfig, PwmSpec, SensorSpec};
    use crate::controller::ControllerConfig;
    use std::fs;
    use tempfile::TempDir;

    /// Builds a fake hwmon tree:
    /// `hwmon0` is a coretemp-style sensor chip, `hwmon1` an nct6775-style
    /// PWM chip without a `pwm1_max` file.
    pub fn create_fake_hwmon_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let hwmon_root = temp_dir.path().join("sys/class/hwmon");

        let hwmon0 = hwmon_root.join("hwmon0");
        fs::create_dir_all(&hwmon0).unwrap();
        fs::write(hwmon0.join("name"), "coretemp").unwrap();
        fs::write(hwmon0.join("temp1_input"), "45500").unwrap();
        fs::write(hwmon0.join("temp1_label"), "CPU Temp").unwrap();

        let hwmon1 = hwmon_root.join("hwmon1");
        fs::create_dir_all(&hwmon1).unwrap();
        fs::write(hwmon1.join("name"), "nct6775").unwrap();
        fs::write(hwmon1.join("pwm1"), "128").unwrap();
        fs::write(hwmon1.join("pwm1_enable"), "2").unwrap();
        fs::write(hwmon1.join("fan1_input"), "1200").unwrap();

        temp_dir
    }

    /// A config pointing at the fake hwmon tree's chips, with the
    /// thresholds the control tests assume.
    pub fn create_test_daemon_config() -> DaemonConfig {
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

    pub fn assert_approx_eq(a: f64, b: f64, tolerance: f64) {
        assert!(
            (a - b).abs() < tolerance,
            "Values {} and {} are not approximately equal (tolerance: {})",
            a, b, tolerance
        );
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use crate::config::validate_config;

    #[test]
    fn test_fake_hwmon_dir_layout() {
        let tree = create_fake_hwmon_dir();
        let root = tree.path().join("sys/class/hwmon");
        assert!(root.join("hwmon0/temp1_input").exists());
        assert!(root.join("hwmon1/pwm1").exists());
        assert!(!root.join("hwmon1/pwm1_max").exists());
    }

    #[test]
    fn test_canned_config_is_valid() {
        assert!(validate_config(&create_test_daemon_config()).is_ok());
    }

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(1.0, 1.001, 0.01);
        assert_approx_eq(25.5, 25.49, 0.1);
    }

    #[test]
    #[should_panic]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq(1.0, 1.1, 0.01);
    }
}
